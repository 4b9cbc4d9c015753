//! Whether a stored certificate needs to be replaced.

use std::fmt;

use time::OffsetDateTime;

use crate::cert::{leaf_validity, Validity};

/// Why a renewal is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Renewal was explicitly requested.
    Forced,

    /// Nothing is stored yet.
    Missing,

    /// Stored bytes are not a readable certificate.
    Unreadable,

    /// The certificate is past two thirds of its lifetime.
    Expiring(Validity),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Forced => f.write_str("renewal forced"),
            Reason::Missing => f.write_str("no certificate stored"),
            Reason::Unreadable => f.write_str("stored certificate is unreadable"),
            Reason::Expiring(validity) => write!(
                f,
                "certificate expires at {} and was due for renewal at {}",
                validity.not_after,
                validity.renew_at(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Due(Reason),
    Valid(Validity),
}

impl Decision {
    pub fn is_due(&self) -> bool {
        matches!(self, Decision::Due(_))
    }
}

/// Decides whether the certificate stored as `full_chain` must be renewed at `now`.
///
/// Renewal is due when forced, when nothing (or nothing readable) is stored, or once `now` reaches
/// two thirds of the leaf certificate's lifetime. An unreadable certificate is logged and treated
/// as due; it never fails the run.
pub fn check(full_chain: Option<&[u8]>, now: OffsetDateTime, force: bool) -> Decision {
    if force {
        return Decision::Due(Reason::Forced);
    }

    let full_chain = match full_chain {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Decision::Due(Reason::Missing),
    };

    let validity = match leaf_validity(full_chain) {
        Ok(validity) => validity,
        Err(err) => {
            log::warn!("Failed to parse stored certificate, renewing it: {err}");
            return Decision::Due(Reason::Unreadable);
        }
    };

    if now >= validity.renew_at() {
        Decision::Due(Reason::Expiring(validity))
    } else {
        Decision::Valid(validity)
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::test::cert_pem;

    const NOT_BEFORE: OffsetDateTime = datetime!(2030-01-01 0:00 UTC);
    const NOT_AFTER: OffsetDateTime = datetime!(2030-04-01 0:00 UTC);
    const RENEW_AT: OffsetDateTime = datetime!(2030-03-02 0:00 UTC);

    #[test]
    fn missing_is_due() {
        let now = datetime!(2030-01-02 0:00 UTC);

        assert_eq!(check(None, now, false), Decision::Due(Reason::Missing));
        assert_eq!(check(Some(b""), now, false), Decision::Due(Reason::Missing));
    }

    #[test]
    fn unreadable_is_due() {
        let now = datetime!(2030-01-02 0:00 UTC);

        for bytes in [
            &b"garbage"[..],
            b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
            b"{\"email\":\"admin@example.com\"}",
        ] {
            assert_eq!(
                check(Some(bytes), now, false),
                Decision::Due(Reason::Unreadable)
            );
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let pem = cert_pem(&["example.com"], NOT_BEFORE, NOT_AFTER);
        let validity = Validity {
            not_before: NOT_BEFORE,
            not_after: NOT_AFTER,
        };
        assert_eq!(validity.renew_at(), RENEW_AT);

        let before = RENEW_AT - Duration::SECOND;
        assert_eq!(
            check(Some(pem.as_bytes()), before, false),
            Decision::Valid(validity)
        );

        assert_eq!(
            check(Some(pem.as_bytes()), RENEW_AT, false),
            Decision::Due(Reason::Expiring(validity))
        );

        let after = RENEW_AT + Duration::SECOND;
        assert!(check(Some(pem.as_bytes()), after, false).is_due());
    }

    #[test]
    fn fresh_and_expired() {
        let pem = cert_pem(&["example.com"], NOT_BEFORE, NOT_AFTER);

        assert!(!check(Some(pem.as_bytes()), NOT_BEFORE, false).is_due());
        assert!(check(Some(pem.as_bytes()), NOT_AFTER, false).is_due());
        assert!(check(Some(pem.as_bytes()), NOT_AFTER + Duration::days(365), false).is_due());
    }

    #[test]
    fn threshold_over_many_lifetimes() {
        for days in [1, 7, 30, 90, 365, 3 * 365] {
            let not_after = NOT_BEFORE + Duration::days(days);
            let pem = cert_pem(&["example.com"], NOT_BEFORE, not_after);
            let renew_at = NOT_BEFORE + Duration::days(days) * 2 / 3;

            assert!(!check(Some(pem.as_bytes()), renew_at - Duration::SECOND, false).is_due());
            assert!(check(Some(pem.as_bytes()), renew_at, false).is_due());
        }
    }

    #[test]
    fn force_wins_over_valid_certificate() {
        let pem = cert_pem(&["example.com"], NOT_BEFORE, NOT_AFTER);

        assert_eq!(
            check(Some(pem.as_bytes()), NOT_BEFORE, true),
            Decision::Due(Reason::Forced)
        );
        assert_eq!(check(None, NOT_BEFORE, true), Decision::Due(Reason::Forced));
    }
}
