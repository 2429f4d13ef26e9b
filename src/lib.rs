// src/lib.rs

// The calculator and memory tool engines that `runtime::tools` wraps.
pub mod cloudllm;

// The agent execution runtime: tool-calling loop driver, progressive tool
// facades, typed object creation, and HITL/replan control flow.
pub mod runtime;
