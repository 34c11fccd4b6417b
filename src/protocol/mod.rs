//! SMTP wire protocol: framing, command grammar, and reply encoding.

pub mod command;
pub mod framer;
pub mod reply;
