mod history;

pub use history::EpisodeHistory;
