//! tagdoc: a tagged-tree codec for structured documents.
//!
//! Documents travel as JSON trees of `{ type, variant, children }` nodes and
//! are shown as a generic markup tree. This crate provides:
//!
//! - **Schema** - the closed set of node types, their typed payloads and the
//!   tag table that maps each type onto markup
//! - **Codec** - lossless conversion between markup and the tagged form,
//!   including the navigation menu subtree and its link probes
//! - **Edit sessions** - in-place editing of a decoded document with change
//!   detection and per-region change records
//! - **Color taxonomy** - the palette shared by links, buttons and spans
//!
//! # Quick Start
//!
//! ```rust
//! use tagdoc::{Decoder, DocItem, LiveTree, serialize_root};
//!
//! let item: DocItem = serde_json::from_str(
//!     r#"{"type":"body","children":[{"type":"p","children":["Hello"]}]}"#,
//! )
//! .unwrap();
//!
//! let mut tree = LiveTree::new("div");
//! let root = tree.root();
//! Decoder::new(&mut tree).decode(root, &item);
//!
//! let back = serialize_root(&tree, root).unwrap();
//! assert_eq!(DocItem::Node(back), item);
//! ```
//!
//! # Features
//!
//! - `url` - Enables [`UrlResolver`] for resolving menu links against a page
//!   address (on by default)

pub mod codec;
pub mod color;
pub mod live;
pub mod schema;
pub mod session;

pub use codec::{
    CodecConfig, Decoder, EditItem, EditRecord, ExistenceCheck, LinkResolver, ProbeTicket,
    deserialize, run_probes, serialize, serialize_root,
};
#[cfg(feature = "url")]
pub use codec::UrlResolver;
pub use color::{Color, InvalidColor, PALETTE_SIZE};
pub use live::{Element, LiveTree, NodeData, NodeId, TreeId};
pub use schema::{
    DecodeError, Decoded, DocItem, DocNode, DroppedNode, NavEntry, TypeTag, Variant,
    decode_lenient,
};
pub use session::{
    ChangeRecord, ChangeSink, EditSession, FnSink, Region, RegionId, SessionConfig, SessionState,
};
