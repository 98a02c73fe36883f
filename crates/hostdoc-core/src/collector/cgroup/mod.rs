//! Cgroup tree collector (v2 preferred, v1 fallback).

mod collector;
pub mod parser;

pub use collector::CgroupCollector;
