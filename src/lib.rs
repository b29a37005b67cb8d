// Followtrail: follower/following history for tracked accounts
//
// This is the library root. The storage layer keeps a bounded snapshot
// history per identity; the diff and history modules turn that history
// into a change feed.

pub mod config;
pub mod db;
pub mod diff;
pub mod fetch;
pub mod history;
pub mod identity;
pub mod insights;
pub mod output;
pub mod status;
pub mod tracker;
