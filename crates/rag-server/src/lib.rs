//! rag-server - Request/response facade over the retrieval engine
//!
//! Every operation takes a serde params struct and returns a [`ToolResult`]
//! carrying a human-readable message and the JSON form of the result.
//!
//! # Tools
//!
//! - `rag_search` - Hybrid, semantic or keyword search for one query
//! - `rag_retrieve` - Multi-query retrieval over generated paraphrases
//! - `rag_expand` - Generate paraphrases of a query
//! - `rag_ask` - Retrieve and synthesize a grounded answer
//! - `rag_stats` - Statistics about the loaded corpus

mod server;

pub use server::{
    AskParams, ExpandParams, RagServer, RetrieveParams, SearchParams, ServerInfo, ToolInfo,
    ToolResult,
};
