//! Property-based tests for request parsing and conversation keys.
//!
//! Uses proptest to verify:
//! 1. Arbitrary input never panics the parser.
//! 2. A well-formed `send` always yields the message as argument 0, followed
//!    by the remaining tokens in order.
//! 3. Personal conversation keys do not depend on argument order.
//! 4. A client-framed `send` resolves to the conversation it was framed for.

use chatty_proto::chat::{ChatKind, Conversation, PersonalKey};
use chatty_proto::command::{Command, CommandKind, ParseError};
use chatty_proto::session::ClientSession;
use proptest::prelude::*;

/// A single protocol token: no spaces, quotes or line breaks.
fn arb_token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,16}"
}

/// Message text that may contain spaces but no quotes or line breaks.
fn arb_message() -> impl Strategy<Value = String> {
    "[^\"\r\n]{0,64}"
}

proptest! {
    #[test]
    fn parse_never_panics(line in any::<String>()) {
        let _ = Command::parse(&line);
    }

    #[test]
    fn send_message_is_first_argument(
        message in arb_message(),
        trailing in prop::collection::vec(arb_token(), 0..5),
    ) {
        let mut line = format!("send \"{message}\"");
        for token in &trailing {
            line.push(' ');
            line.push_str(token);
        }

        let command = Command::parse(&line).unwrap();
        prop_assert_eq!(command.kind(), CommandKind::SendMessage);
        prop_assert_eq!(command.arg(0), Some(message.as_str()));
        prop_assert_eq!(&command.args()[1..], trailing.as_slice());
    }

    #[test]
    fn send_with_glued_quote_is_rejected(
        head in arb_token(),
        message in arb_message(),
    ) {
        let line = format!("send {head}\"{message}\"");
        prop_assert!(matches!(
            Command::parse(&line),
            Err(ParseError::MalformedCommand(_))
        ));
    }

    #[test]
    fn plain_commands_keep_every_token(
        name in arb_token(),
        args in prop::collection::vec(arb_token(), 0..6),
    ) {
        prop_assume!(CommandKind::of(&name) != CommandKind::SendMessage);
        let line = std::iter::once(name.clone()).chain(args.iter().cloned()).collect::<Vec<_>>().join(" ");

        let command = Command::parse(&line).unwrap();
        prop_assert_eq!(command.name(), name.as_str());
        prop_assert_eq!(command.args(), args.as_slice());
    }

    #[test]
    fn personal_key_is_symmetric(left in arb_token(), right in arb_token()) {
        prop_assert_eq!(PersonalKey::new(&left, &right), PersonalKey::new(&right, &left));
        prop_assert_eq!(
            Conversation::personal(&left, &right),
            Conversation::personal(&right, &left)
        );
    }

    #[test]
    fn framed_send_resolves_to_open_chat(
        me in arb_token(),
        friend in arb_token(),
        message in arb_message(),
        group_chat in any::<bool>(),
    ) {
        let mut session = ClientSession::new();
        session.log_in(me.clone());
        let (kind, expected) = if group_chat {
            (ChatKind::Group, Conversation::group(&friend))
        } else {
            (ChatKind::Personal, Conversation::personal(&me, &friend))
        };
        session.enter_chat(kind, friend.clone());

        let command = Command::parse(&session.frame(&format!("send \"{message}\""))).unwrap();
        prop_assert_eq!(command.arg(0), Some(message.as_str()));
        prop_assert_eq!(Conversation::from_trailing(command.args()), Some(expected));
    }
}
