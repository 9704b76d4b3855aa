// Parallel extraction on rayon, single-threaded merge

use super::{Graph, GraphBuilder, GraphInconsistencyError};
use crate::cache::ExtractionCache;
use crate::config::Config;
use crate::context::{CancelToken, Cancelled};
use crate::discovery::SourceFile;
use crate::parser::{extract, FileExtraction};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    Inconsistent(#[from] GraphInconsistencyError),
}

/// Extracts every file in parallel, then merges the results into one graph
pub struct ParallelGraphBuilder<'c> {
    config: &'c Config,
    show_progress: bool,
}

impl<'c> ParallelGraphBuilder<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the graph from scanned files, reusing cached extractions by content hash
    pub fn build_from_files(
        &self,
        files: &[SourceFile],
        cache: &mut ExtractionCache,
        cancel: &CancelToken,
    ) -> Result<Graph, BuildError> {
        let mut extractions: Vec<Option<Arc<FileExtraction>>> = files
            .iter()
            .map(|file| cache.get(&file.path, &file.content_hash))
            .collect();
        let missing: Vec<usize> = extractions
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_none())
            .map(|(idx, _)| idx)
            .collect();

        info!(
            "Extracting {} files in parallel ({} cached)...",
            missing.len(),
            files.len() - missing.len()
        );

        let progress = self.progress_bar(missing.len());
        let fresh: Vec<(usize, FileExtraction)> = missing
            .par_iter()
            .map(|&idx| {
                cancel.check()?;
                let extraction = extract(&files[idx]);
                progress.inc(1);
                Ok((idx, extraction))
            })
            .collect::<Result<_, Cancelled>>()?;
        progress.finish_and_clear();

        for (idx, extraction) in fresh {
            let file = &files[idx];
            if file.undecodable {
                warn!("{} is not valid UTF-8; treating it as opaque", file.path.display());
            }
            let extraction = Arc::new(extraction);
            cache.insert(file.path.clone(), file.content_hash.clone(), Arc::clone(&extraction));
            extractions[idx] = Some(extraction);
        }
        cache.retain_paths(files.iter().map(|f| f.path.as_path()));

        // Merge in path order so edge order does not depend on scheduling
        let mut order: Vec<usize> = (0..files.len()).collect();
        order.sort_by(|a, b| files[*a].path.cmp(&files[*b].path));

        let mut builder = GraphBuilder::new(self.config);
        for idx in order {
            cancel.check()?;
            if let Some(extraction) = &extractions[idx] {
                builder.add_file(&files[idx], extraction);
            }
        }

        info!("Resolving references...");
        let graph = builder.build()?;
        info!(
            "Graph: {} files, {} symbols, {} edges",
            graph.files().count(),
            graph.symbol_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}
