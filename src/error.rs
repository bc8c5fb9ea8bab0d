//! Domain-level outcome types.
//!
//! These are not exceptions — they're plain data returned from the
//! Subscription Registry and Registrar, mapped to wire result bytes by the
//! caller. Keeping them as enums (rather than bare `bool`/`u8`) makes the
//! two inverted success polarities from §4.D/§9 explicit at every call site.

/// Outcome of `SubscriptionRegistry::subscribe`. Wire polarity: success = 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    NoSuchKey,
    AlreadySubscribed,
    Capacity,
}

impl SubscribeOutcome {
    /// SUBSCRIBE's wire polarity is inverted relative to UNSUBSCRIBE: 1 means success.
    pub fn result_byte(self) -> u8 {
        match self {
            SubscribeOutcome::Subscribed => 1,
            _ => 0,
        }
    }
}

/// Outcome of `SubscriptionRegistry::unsubscribe`. Wire polarity: success = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    WasNotSubscribed,
}

impl UnsubscribeOutcome {
    pub fn result_byte(self) -> u8 {
        match self {
            UnsubscribeOutcome::Removed => 0,
            UnsubscribeOutcome::WasNotSubscribed => 1,
        }
    }
}

/// Outcome of the Registrar's slot-claim step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Accepted,
    Full,
}

impl ConnectOutcome {
    pub fn result_byte(self) -> u8 {
        match self {
            ConnectOutcome::Accepted => 0,
            ConnectOutcome::Full => 1,
        }
    }
}
