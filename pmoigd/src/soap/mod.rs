//! # Module SOAP - actions de redirection de ports
//!
//! - [`SoapAction`] : les quatre actions WANIPConnection et leurs enveloppes
//! - [`invoke_action`] : envoi sur le flux TCP et collecte des lignes de réponse
//! - interprètes : [`interpret_verify`], [`add_succeeded`], [`delete_succeeded`],
//!   [`parse_generic_entry`]

mod envelope;
mod invoker;
mod reply;

pub use envelope::SoapAction;
pub use invoker::{LINE_IDLE_TIMEOUT, TCP_CONNECTION_TIMEOUT, invoke_action};
pub use reply::{
    GenericEntryReply, ReplyLines, VerifyOutcome, add_succeeded, delete_succeeded,
    interpret_verify, parse_generic_entry,
};

pub(crate) use invoker::{await_reply, connect_with_retry, next_reply_line};
