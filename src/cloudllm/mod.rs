// src/cloudllm/mod.rs
//
// The calculator and memory tool engines `runtime::tools` wraps. Agent
// orchestration, planning, and multi-client wiring live in `crate::runtime`.

pub mod tools;
