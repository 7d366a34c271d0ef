//! N5 containers over a pluggable key-value backend.
//!
//! - [storage]: key-value access with advisory shared/exclusive locking
//! - [url]: the N5URL group-path + attribute-path addressing scheme
//! - [attribute]: navigation of JSON attribute documents
//! - [block], [codec], [vlen], [object]: the block format and its codecs
//! - [container]: the operations above, sequenced over one container
pub mod attribute;
pub mod block;
pub mod codec;
pub mod container;
mod error;
pub mod metadata;
pub mod object;
pub mod path;
pub mod storage;
pub mod url;
pub mod vlen;

pub use zarrs;

pub use container::N5Container;
pub use error::{Error, Result};
pub use url::{AttributeToken, N5Url};
