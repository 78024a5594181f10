//! Application hooks that observe or divert traffic.

use std::fmt;
use std::sync::Arc;

use crate::message::MessageContainer;

/// What happens to a message when a hook is registered for its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReroutePolicy {
    /// Forward to the default destination only.
    #[default]
    None,
    /// Forward to the default destination and show the hook a reference.
    Echo,
    /// Hand the message to the hook; the default destination never sees it.
    Intercept,
}

/// Traffic direction a hook is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the host, on its way to the stack.
    Inbound,
    /// From the stack, on its way to the host.
    Outbound,
}

/// What a hook receives.
#[derive(Debug)]
pub enum Rerouted<'a> {
    /// ECHO: the router keeps ownership and still forwards the message.
    Observed(&'a MessageContainer),
    /// INTERCEPT: the hook owns the message and must release it.
    Owned(MessageContainer),
}

impl Rerouted<'_> {
    pub fn message(&self) -> &MessageContainer {
        match self {
            Self::Observed(message) => *message,
            Self::Owned(message) => message,
        }
    }
}

pub type RerouteCallback = Arc<dyn Fn(Rerouted<'_>) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Registration {
    callback: RerouteCallback,
    policy: ReroutePolicy,
}

/// Result of running a message past a hook.
#[derive(Debug)]
pub(crate) enum Routed {
    /// Keep forwarding; `echoed` if a hook saw a reference.
    Forward {
        message: MessageContainer,
        echoed: bool,
    },
    Intercepted,
}

impl Registration {
    /// Apply this registration's policy. Invoke without holding any router lock.
    pub(crate) fn apply(&self, message: MessageContainer) -> Routed {
        match self.policy {
            ReroutePolicy::None => Routed::Forward {
                message,
                echoed: false,
            },
            ReroutePolicy::Echo => {
                (self.callback)(Rerouted::Observed(&message));
                Routed::Forward {
                    message,
                    echoed: true,
                }
            }
            ReroutePolicy::Intercept => {
                (self.callback)(Rerouted::Owned(message));
                Routed::Intercepted
            }
        }
    }
}

/// Last-registration-wins hook table, one slot per direction.
#[derive(Default, Clone)]
pub(crate) struct RerouteHooks {
    inbound: Option<Registration>,
    outbound: Option<Registration>,
}

impl RerouteHooks {
    pub(crate) fn register(
        &mut self,
        direction: Direction,
        callback: RerouteCallback,
        policy: ReroutePolicy,
    ) {
        *self.slot(direction) = Some(Registration { callback, policy });
    }

    pub(crate) fn clear(&mut self, direction: Direction) {
        *self.slot(direction) = None;
    }

    pub(crate) fn get(&self, direction: Direction) -> Option<Registration> {
        match direction {
            Direction::Inbound => self.inbound.clone(),
            Direction::Outbound => self.outbound.clone(),
        }
    }

    fn slot(&mut self, direction: Direction) -> &mut Option<Registration> {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }
}

impl fmt::Debug for RerouteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerouteHooks")
            .field("inbound", &self.inbound.as_ref().map(|r| r.policy))
            .field("outbound", &self.outbound.as_ref().map(|r| r.policy))
            .finish()
    }
}

/// Run `message` past an optional registration. No registration means NONE.
pub(crate) fn route(registration: Option<&Registration>, message: MessageContainer) -> Routed {
    match registration {
        Some(registration) => registration.apply(message),
        None => Routed::Forward {
            message,
            echoed: false,
        },
    }
}
