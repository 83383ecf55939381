mod processor;

pub use processor::ProcessorRefunder;
