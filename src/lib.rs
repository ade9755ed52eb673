//! chartscan — text extraction for clinical documents.
//!
//! Takes PDFs and raster images (scans, photos of paperwork) and produces
//! normalized plain text plus per-file warnings. Cheap local methods run
//! first: the PDF text layer is read directly, images go through on-device
//! OCR. An optional remote vision service handles documents the local
//! engines cannot, behind a content-addressed cache and a running cost
//! tracker so identical documents are never paid for twice.
//!
//! ```no_run
//! use chartscan::config::PipelineOptions;
//! use chartscan::pipeline::{run_sequential, DocumentInput, MockOcrEngine};
//!
//! let files = vec![DocumentInput::new("visit.pdf", std::fs::read("visit.pdf")?)];
//! let engine = MockOcrEngine::new("", 0.0);
//! let batch = run_sequential(&files, &engine, &PipelineOptions::default(), None)?;
//! println!("{}", batch.merged_text);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod pipeline;
pub mod storage;

pub use config::PipelineOptions;
pub use pipeline::ExtractionError;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
