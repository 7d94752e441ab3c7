pub mod canvas;
pub mod domain;
pub mod export;
pub mod ports;

pub use canvas::{CanvasError, CanvasSession, ItemDraft};
pub use domain::{
    AuthSession, CanvasItem, ItemType, JournalPage, Position, Size, StoredFile, User,
    UserCredentials,
};
pub use ports::{
    FileStore, IdentityStore, ImageGenerationService, JournalStore, PortError, PortResult,
    SpeechToTextService,
};
