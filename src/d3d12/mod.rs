pub(crate) mod buffer;
pub(crate) mod commands;
pub(crate) mod fence;
pub(crate) mod interface;
pub(crate) mod readback;

pub use buffer::{ReadbackBufferCreateError, ReadbackBufferMapError};
pub use commands::{CopyCommandCreateError, CopyCommandError};
pub use fence::{FenceCreateError, FenceWaitError};
pub use interface::GraphicsQueueAcquireError;
pub use readback::ReadbackError;
