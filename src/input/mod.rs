/// Line-oriented input bridge feeding point updates into the event loop
pub mod stdin_collector;

pub use stdin_collector::StdinCollector;
