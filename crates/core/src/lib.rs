pub mod audit;
pub mod blocks;
pub mod builder;
pub mod config;
pub mod domain;
pub mod errors;
pub mod wizard;

pub use blocks::editor::{BlockEditor, EditorError, ObjectStore, ObjectStoreError, StoredObject, UploadFile};
pub use blocks::render::{render_block, render_blocks, BlockPosition, RenderOptions};
pub use blocks::{Block, BlockContent, BlockId, BlockKind, BlockSettings};
pub use builder::{BlockSink, BlockSinkError, EditorMode, PageBuilder};
pub use domain::cctv_quote::{
    CctvQuoteRecord, CctvQuoteRequest, QuoteListFilter, QuoteReceipt, QuoteRequestId,
    QuoteRequestStatus,
};
pub use domain::page::{Page, PageId, PageStatus, PageUpdate};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use wizard::{QuoteSubmitter, SubmitError, WizardEngine, WizardError, WizardSettings};
