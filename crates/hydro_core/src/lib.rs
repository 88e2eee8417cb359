pub mod clock;
pub mod detector;
pub mod error;
pub mod notifications;
pub mod plant;
pub mod presenter;
pub mod settings;
pub mod storage;
pub mod store;

pub use crate::detector::{EventDetector, ReminderWindow, ScanReport};
pub use crate::notifications::{Category, NotificationRecord};
pub use crate::plant::{Plant, PlantSource};
pub use crate::store::{NotificationStore, NotificationStoreBuilder, Retention};
