// Which kind of endpoint a request is counted against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Image,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub authenticated: u32,
    pub anonymous: u32,
}

/// Requests per window, by endpoint class and authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTable {
    pub image: TierLimits,
    pub generic: TierLimits,
}

impl TierTable {
    pub fn limit_for(&self, class: EndpointClass, authenticated: bool) -> u32 {
        let limits = match class {
            EndpointClass::Image => self.image,
            EndpointClass::Generic => self.generic,
        };

        if authenticated {
            limits.authenticated
        } else {
            limits.anonymous
        }
    }

    // Used by status queries for callers the store has never seen
    pub fn default_limit(&self) -> u32 {
        self.generic.authenticated
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            image: TierLimits {
                authenticated: 30,
                anonymous: 5,
            },
            generic: TierLimits {
                authenticated: 60,
                anonymous: 20,
            },
        }
    }
}
