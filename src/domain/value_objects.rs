use crate::domain::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 为状态枚举生成持久化字符串的双向映射
macro_rules! status_strings {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// 持久化使用的字符串表示
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(DomainError::InternalError(format!(
                        "Unknown {} value: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

/// 活动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// 即将开始，可售票
    Upcoming,
    /// 已停售
    Closed,
    /// 已取消
    Cancelled,
}

status_strings!(EventStatus {
    Upcoming => "upcoming",
    Closed => "closed",
    Cancelled => "cancelled",
});

/// 座位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Available,
    Booked,
}

status_strings!(SeatStatus {
    Available => "available",
    Booked => "booked",
});

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 待支付
    Pending,
    /// 已确认
    Confirmed,
    /// 已取消
    Cancelled,
    /// 已退款
    Refunded,
}

status_strings!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl OrderStatus {
    /// 是否计入用户的购票配额
    pub const fn counts_toward_quota(&self) -> bool {
        match self {
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Refunded => true,
            OrderStatus::Cancelled => false,
        }
    }

    /// 是否计入活动收入
    pub const fn counts_toward_revenue(&self) -> bool {
        match self {
            OrderStatus::Confirmed => true,
            OrderStatus::Pending | OrderStatus::Cancelled | OrderStatus::Refunded => false,
        }
    }
}

/// 票状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// 有效
    Active,
    /// 已入场（终态）
    Used,
    /// 已作废（终态）
    Cancelled,
}

status_strings!(TicketStatus {
    Active => "active",
    Used => "used",
    Cancelled => "cancelled",
});

impl TicketStatus {
    /// 该票是否仍占用座位
    pub const fn holds_seat(&self) -> bool {
        match self {
            TicketStatus::Active | TicketStatus::Used => true,
            TicketStatus::Cancelled => false,
        }
    }
}

/// 退款申请状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
}

status_strings!(RefundStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// 退款审核结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundDecision {
    Approved,
    Rejected,
}

impl From<RefundDecision> for RefundStatus {
    fn from(decision: RefundDecision) -> Self {
        match decision {
            RefundDecision::Approved => RefundStatus::Approved,
            RefundDecision::Rejected => RefundStatus::Rejected,
        }
    }
}

/// 客服工单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    Open,
    InProgress,
    Closed,
}

status_strings!(SupportStatus {
    Open => "open",
    InProgress => "in_progress",
    Closed => "closed",
});

/// 入场核验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Valid,
    Invalid,
}

status_strings!(EntryStatus {
    Valid => "valid",
    Invalid => "invalid",
});

/// 支付方式（支付为模拟，始终成功）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Card,
    Upi,
    NetBanking,
    Wallet,
}

status_strings!(PaymentMode {
    Card => "card",
    Upi => "upi",
    NetBanking => "net_banking",
    Wallet => "wallet",
});

/// 货币金额（分为单位，避免浮点数精度问题）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money {
    /// 金额（分）
    pub amount_cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { amount_cents: 0 };

    /// 创建新的金额对象（单位：元）
    #[cfg(test)]
    pub fn from_units(amount: i64) -> Self {
        Self {
            amount_cents: amount * 100,
        }
    }

    /// 创建新的金额对象（单位：分）
    pub fn from_cents(cents: i64) -> Self {
        Self { amount_cents: cents }
    }

    /// 转换为元
    pub fn to_units(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }

    /// 转换为分
    pub fn to_cents(&self) -> i64 {
        self.amount_cents
    }

    /// 单价乘以数量，溢出时返回 None
    pub fn checked_mul(&self, quantity: usize) -> Option<Money> {
        let quantity = i64::try_from(quantity).ok()?;
        self.amount_cents
            .checked_mul(quantity)
            .map(Money::from_cents)
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.amount_cents
            .checked_add(other.amount_cents)
            .map(Money::from_cents)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_units())
    }
}
