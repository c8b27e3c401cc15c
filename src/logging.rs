//! Helper macros enforcing consistent beacon log fields.
//!
//! Background work (resurrection, notification, sweeps) runs detached from the
//! request that started it, so every event carries the probed `domain` (and the
//! affected `service` when one is known) for correlation.

/// Log an event for a domain, optionally scoped to a service, plus any extra fields.
#[macro_export]
macro_rules! beacon_event {
    ($level:ident, $event:expr, domain = $domain:expr, service = $service:expr $(, $field:ident = $value:expr )* $(,)?) => {
        tracing::$level!(
            event = $event,
            domain = %$domain,
            service = %$service,
            $($field = %$value,)*
        )
    };
    ($level:ident, $event:expr, domain = $domain:expr $(, $field:ident = $value:expr )* $(,)?) => {
        tracing::$level!(
            event = $event,
            domain = %$domain,
            $($field = %$value,)*
        )
    };
}
