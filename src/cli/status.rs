use std::path::PathBuf;

use clap::Parser;

use crate::status::{JsonFileSink, LogSink, StatusPublisher, TableSink};

#[derive(Parser)]
pub struct StatusArgs {
    /// Also write every status snapshot to this JSON file.
    #[clap(long = "status-file", env = "STATUS_FILE")]
    status_file: Option<PathBuf>,
}

impl StatusArgs {
    pub fn publisher(&self) -> StatusPublisher {
        let publisher = StatusPublisher::default().with(TableSink).with(LogSink);
        match &self.status_file {
            Some(path) => publisher.with(JsonFileSink(path.clone())),
            None => publisher,
        }
    }
}
