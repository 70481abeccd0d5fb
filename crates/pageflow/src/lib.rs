pub mod background;
pub mod cache;
pub mod oracle;
pub mod paginate;
pub mod tokens;
pub mod types;

pub use background::{BackgroundPaginator, FillRequest, SharedEngine};
pub use cache::{CacheError, CacheRecord, PageStore};
pub use oracle::{LayoutOracle, Line};
pub use paginate::{BlockCursor, Cursor, Fragment, LayoutConfig, Page, PaginationEngine};
pub use types::{Alignment, Block, Document, ImageBlock, TextBlock, TextStyle};
