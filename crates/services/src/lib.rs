#![forbid(unsafe_code)]

pub mod completion;
pub mod error;
pub mod frames;
pub mod host;
pub mod render;
pub mod resume;
pub mod settings;
pub mod surface;
pub mod watcher;
pub mod widget;

pub use watch_core::Clock;

pub use completion::{CompletionReport, CompletionSink, ReportMarker};
pub use error::{RenderError, ResumeError, SettingsError, SinkError, WidgetError};
pub use frames::{FrameScheduler, IntervalFrames, ManualFrames};
pub use host::{HostPlayer, SessionSurface};
pub use render::{RichTextRenderer, SanitizingRenderer};
pub use resume::{PreparedSession, ResumeService};
pub use settings::WatcherSettings;
pub use surface::{BranchChoice, BranchDecision, ChoiceKind, ContentArea, Indicator};
pub use watcher::{OutcomeWatcher, WatchHandle, WatchState, WatchStatus};
pub use widget::{EventDispatcher, ListenerId, UserStateSlot, WidgetRuntime};
