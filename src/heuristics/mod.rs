mod logger;

pub use logger::HeuristicLogger;
