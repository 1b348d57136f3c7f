pub mod mailbox;
pub mod pacer;
pub mod shutdown;

pub use mailbox::{frame_mailbox, MailboxConsumer, MailboxProducer, MailboxStats};
pub use pacer::{Pacer, RenderLoop};
pub use shutdown::{run_flag, RunFlag, StopHandle};
