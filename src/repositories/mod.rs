pub(crate) mod competitions;
pub(crate) mod leaderboard;
pub(crate) mod questions;
pub(crate) mod quizzes;
pub(crate) mod submissions;
pub(crate) mod users;
