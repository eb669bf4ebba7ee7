mod client;

pub use client::{cancellable, Downloader};
