//! Topic name and topic filter checks.
//!
//! These run before a request reaches the transport, so a bad topic is
//! rejected without any network traffic.

use thiserror::Error;

/// Longest topic in bytes that fits the two-byte length prefix.
pub const MAX_TOPIC_LENGTH: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,

    #[error("topic is longer than {} bytes", MAX_TOPIC_LENGTH)]
    TooLong,

    #[error("topic contains a NUL character")]
    NulCharacter,

    #[error("wildcards are not allowed in a topic name")]
    WildcardInName,

    #[error("'+' must occupy a whole topic level")]
    MisplacedSingleLevelWildcard,

    #[error("'#' must be the last topic level on its own")]
    MisplacedMultiLevelWildcard,
}

/// Checks a topic name used for publishing.
///
/// ```
/// use multimeter_core::topic::{check_topic_name, TopicError};
///
/// assert!(check_topic_name("sensors/kitchen").is_ok());
/// assert_eq!(check_topic_name("sensors/+"), Err(TopicError::WildcardInName));
/// ```
pub fn check_topic_name(topic: &str) -> Result<(), TopicError> {
    check_encoding(topic)?;
    if topic.contains(['+', '#']) {
        return Err(TopicError::WildcardInName);
    }
    Ok(())
}

/// Checks a topic filter used for subscribing or unsubscribing.
///
/// ```
/// use multimeter_core::topic::check_topic_filter;
///
/// assert!(check_topic_filter("sensors/+/temp").is_ok());
/// assert!(check_topic_filter("sensors/#/temp").is_err());
/// ```
pub fn check_topic_filter(filter: &str) -> Result<(), TopicError> {
    check_encoding(filter)?;

    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        if level.contains('+') && level != "+" {
            return Err(TopicError::MisplacedSingleLevelWildcard);
        }
        if level.contains('#') && (level != "#" || levels.peek().is_some()) {
            return Err(TopicError::MisplacedMultiLevelWildcard);
        }
    }
    Ok(())
}

fn check_encoding(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        Err(TopicError::Empty)
    } else if topic.len() > MAX_TOPIC_LENGTH {
        Err(TopicError::TooLong)
    } else if topic.contains('\0') {
        Err(TopicError::NulCharacter)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        for ok in ["a", "a/b/c", "/leading", "trailing/", "//", "$SYS/uptime"] {
            assert_eq!(check_topic_name(ok), Ok(()), "{ok}");
        }
        assert_eq!(check_topic_name(""), Err(TopicError::Empty));
        assert_eq!(check_topic_name("a\0b"), Err(TopicError::NulCharacter));
        assert_eq!(check_topic_name("#"), Err(TopicError::WildcardInName));
        assert_eq!(check_topic_name("a/+/b"), Err(TopicError::WildcardInName));
    }

    #[test]
    fn filters() {
        for ok in ["#", "+", "a/+/b", "a/#", "+/+/#", "/", "/#", "a/b"] {
            assert_eq!(check_topic_filter(ok), Ok(()), "{ok}");
        }
        assert_eq!(
            check_topic_filter("a/b+"),
            Err(TopicError::MisplacedSingleLevelWildcard)
        );
        assert_eq!(
            check_topic_filter("a/#/b"),
            Err(TopicError::MisplacedMultiLevelWildcard)
        );
        assert_eq!(
            check_topic_filter("a/b#"),
            Err(TopicError::MisplacedMultiLevelWildcard)
        );
    }

    #[test]
    fn length_limit_is_inclusive() {
        assert_eq!(check_topic_name(&"t".repeat(MAX_TOPIC_LENGTH)), Ok(()));
        assert_eq!(
            check_topic_filter(&"t".repeat(MAX_TOPIC_LENGTH + 1)),
            Err(TopicError::TooLong)
        );
    }
}
