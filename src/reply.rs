//! Turns a model reply into the outbound messages of one batched reply.

use crate::core::line::OutboundMessage;

/// Split `reply` on `delimiter`. Segments are kept verbatim, empty ones included.
pub fn split_reply(reply: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return vec![reply.to_string()];
    }
    reply.split(delimiter).map(str::to_string).collect()
}

pub fn format_reply(reply: &str, delimiter: &str) -> Vec<OutboundMessage> {
    split_reply(reply, delimiter)
        .into_iter()
        .map(OutboundMessage::text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_delimiter_yields_two_messages() {
        let messages = format_reply("Proof for 1 hour.\n\nCheck it doubles in size.", "\n\n");
        assert_eq!(
            messages,
            vec![
                OutboundMessage::text("Proof for 1 hour."),
                OutboundMessage::text("Check it doubles in size."),
            ]
        );
    }

    #[test]
    fn test_interior_whitespace_is_kept() {
        let segments = split_reply("  line one\nline two \n\n\tnext", "\n\n");
        assert_eq!(segments, vec!["  line one\nline two ", "\tnext"]);
    }

    #[test]
    fn test_no_delimiter_is_one_message() {
        assert_eq!(split_reply("just one", "\n\n"), vec!["just one"]);
    }

    #[test]
    fn test_no_cap_on_segment_count() {
        let reply = (1..=7).map(|i| i.to_string()).collect::<Vec<_>>().join("\n\n");
        assert_eq!(format_reply(&reply, "\n\n").len(), 7);
    }

    #[test]
    fn test_repeated_delimiters_leave_empty_segments() {
        assert_eq!(split_reply("a\n\n\n\nb", "\n\n"), vec!["a", "", "b"]);
    }
}
