//! # parlor-protocol
//!
//! Wire records exchanged between Parlor clients and the chat room.
//!
//! Clients send a [`ClientFrame`] carrying only the message body; the server
//! stamps it with the sender's name, avatar and time and fans it out to every
//! member as a [`ChatFrame`].
//!
//! ## Encodings
//!
//! - **JSON** text frames, the default for browsers
//! - **MessagePack** binary frames, selected per connection
//!
//! ## Example
//!
//! ```rust
//! use parlor_protocol::{codec, ChatFrame, Encoding};
//!
//! let inbound = codec::decode_text(r#"{"message":"hello"}"#).unwrap();
//! assert_eq!(inbound.message, "hello");
//!
//! let frame = ChatFrame::new("alice", "hello", "//www.gravatar.com/avatar/abc");
//! let encoded = codec::encode(&frame, Encoding::Json).unwrap();
//! assert!(encoded.is_text());
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode_binary, decode_text, encode, EncodedFrame, Encoding, ProtocolError};
pub use frames::{ChatFrame, ClientFrame};
