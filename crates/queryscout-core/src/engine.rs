//! Pipeline facade
//!
//! `QueryScout` owns the whole pipeline: the single-flight project
//! scan, the alias map it produces, the plan runner, and the report
//! cache. Hosts hand it a file's identity and current text and get
//! back a `FileFullReport`, or `None` when the file has no query call
//! sites. Per-file analysis only reads shared state and can run on any
//! number of caller threads once setup is complete.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::analyze::{self, RecommendedIndex};
use crate::cache::ResultCache;
use crate::config::AnalyzerConfig;
use crate::error::CoreError;
use crate::explain::adapter::DatabaseAdapter;
use crate::explain::ExplainRunner;
use crate::extract::QueryCallExtractor;
use crate::parse::{EntityAliasMap, NormalizedQuery, QueryParser};
use crate::report::{FileFullReport, QueryIndexReport, QueryScore};
use crate::scanner::{ScanConfig, ScanStats, SourceRootKind, SourceWalker};
use crate::session::Session;

/// Read-only state produced by the whole-project scan, shared by all
/// analysis requests of one configuration generation.
pub struct ProjectState {
    pub aliases: EntityAliasMap,
    pub stats: ScanStats,
    pub queries_found: usize,
}

pub struct QueryScout {
    config: AnalyzerConfig,
    scan_config: ScanConfig,
    session: Session<ProjectState>,
    cache: ResultCache,
    runner: ExplainRunner,
}

impl QueryScout {
    pub fn new(config: AnalyzerConfig, scan_config: ScanConfig) -> Self {
        let runner = ExplainRunner::new(&config);
        Self::with_runner(config, scan_config, runner)
    }

    /// Swap in non-default adapters (tests, embedders).
    pub fn with_adapters(
        config: AnalyzerConfig,
        scan_config: ScanConfig,
        adapters: Vec<Arc<dyn DatabaseAdapter>>,
    ) -> Self {
        let runner = ExplainRunner::with_adapters(&config, adapters);
        Self::with_runner(config, scan_config, runner)
    }

    fn with_runner(config: AnalyzerConfig, scan_config: ScanConfig, runner: ExplainRunner) -> Self {
        let cache = ResultCache::new(config.cache_expiry());
        Self {
            config,
            scan_config,
            session: Session::new(),
            cache,
            runner,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run the whole-project scan if it has not run for the current
    /// configuration generation. Concurrent callers share one scan.
    pub fn ensure_ready(&self) -> Result<Arc<ProjectState>, CoreError> {
        self.session.ensure_ready(|| self.scan_project())
    }

    /// Invalidate session state and cached reports. Call after the
    /// connection configuration changes.
    pub fn reset(&self) {
        self.session.reset();
        self.cache.clear();
    }

    fn scan_project(&self) -> Result<ProjectState, CoreError> {
        log::info!(
            "project scan starting ({} source roots)",
            self.scan_config.source_roots.len()
        );
        let walker = SourceWalker::new(self.scan_config.clone());
        let (files, stats) = walker.walk()?;

        let checked_types = self.config.checked_type_list();
        // extractor construction is deterministic, so a grammar or
        // query-compilation failure must surface here as an error
        // rather than silently yielding an empty scan
        let _ = QueryCallExtractor::new(&checked_types)?;
        let extracts: Vec<_> = files
            .par_iter()
            .map_init(
                || QueryCallExtractor::new(&checked_types).ok(),
                |extractor, file| {
                    let extractor = extractor.as_mut()?;
                    let text = fs::read_to_string(&file.path).ok()?;
                    let mut extract = extractor.extract(&file.relative, &text);
                    if file.root_kind == SourceRootKind::Dependency {
                        // dependency roots feed the alias map only
                        extract.records.clear();
                    }
                    Some(extract)
                },
            )
            .flatten()
            .collect();

        let mut aliases = EntityAliasMap::default();
        let mut queries_found = 0;
        for extract in &extracts {
            for entity in &extract.entities {
                aliases.add(entity.clone());
            }
            queries_found += extract.records.len();
        }

        log::info!(
            "project scan done: {} files, {} queries, {} entities in {:?}",
            stats.total_files,
            queries_found,
            aliases.len(),
            stats.duration
        );
        Ok(ProjectState {
            aliases,
            stats,
            queries_found,
        })
    }

    /// Analyze a file on disk.
    pub fn analyze_file(&self, path: &Path) -> Result<Option<Arc<FileFullReport>>, CoreError> {
        let text = fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.analyze_source(&path.to_string_lossy(), &text)
    }

    /// Analyze one file's current text. Returns `None` when the file
    /// contains no query call sites, distinguishing "nothing to
    /// analyze" from "analysis found problems".
    pub fn analyze_source(
        &self,
        file_id: &str,
        text: &str,
    ) -> Result<Option<Arc<FileFullReport>>, CoreError> {
        let state = self.ensure_ready()?;

        let fingerprint = ResultCache::fingerprint(text);
        if let Some(report) = self.cache.get(&fingerprint) {
            log::debug!("cache hit for {}", file_id);
            return Ok(Some(report));
        }

        let checked_types = self.config.checked_type_list();
        let mut extractor = QueryCallExtractor::new(&checked_types)?;
        let extract = extractor.extract(file_id, text);
        if !extract.query_found() {
            return Ok(None);
        }

        // the file's own entities may not be in the project map yet
        // (unsaved edits), so layer them on top
        let mut aliases = state.aliases.clone();
        for entity in &extract.entities {
            aliases.add(entity.clone());
        }
        let normalized = QueryParser::new(aliases).run(std::slice::from_ref(&extract));

        let report = self.build_report(file_id, &fingerprint, &extract, &normalized);
        let report = Arc::new(report);
        self.cache.put(&fingerprint, Arc::clone(&report));
        Ok(Some(report))
    }

    fn build_report(
        &self,
        file_id: &str,
        fingerprint: &str,
        extract: &crate::extract::SourceExtract,
        normalized: &HashMap<String, NormalizedQuery>,
    ) -> FileFullReport {
        let mut index_report = QueryIndexReport::default();
        let mut query_scores = Vec::new();
        let mut recommendations: Vec<RecommendedIndex> = Vec::new();
        // one plan round trip per distinct query text
        let mut plan_outcomes: HashMap<&str, Result<(u32, String), String>> = HashMap::new();

        for record in &extract.records {
            index_report.record_extract(record);
            let Some(query) = normalized.get(&record.query_text) else {
                continue;
            };

            let Some(resolved) = query.resolved_query() else {
                if let Some(reason) = query.failure_reason() {
                    index_report.record_failure(&record.query_text, reason);
                }
                continue;
            };

            let outcome = plan_outcomes
                .entry(record.query_text.as_str())
                .or_insert_with(|| {
                    self.runner.obtain_plan(&resolved.sql).map(|plan| {
                        let mined: Vec<_> = analyze::mine_plan(&plan)
                            .into_iter()
                            .filter(|rec| rec.is_index_affect(resolved))
                            .collect();
                        recommendations.extend(mined);
                        analyze::score_plan(&plan)
                    })
                });

            match outcome {
                Ok((score, summary)) => query_scores.push(QueryScore {
                    original_query: record.query_text.clone(),
                    location: record.span,
                    score: *score,
                    plan_summary: summary.clone(),
                }),
                Err(reason) => index_report.record_failure(&record.query_text, reason),
            }
        }

        let mut recommended_indexes = analyze::merge(recommendations);
        recommended_indexes.retain(|r| r.priority >= self.config.recommend_index_threshold);

        FileFullReport {
            file: file_id.to_string(),
            fingerprint: fingerprint.to_string(),
            query_scores,
            recommended_indexes,
            index_report,
        }
    }

    /// Analyze every file under the source roots. Files without query
    /// call sites produce no report.
    pub fn analyze_project(&self) -> Result<Vec<Arc<FileFullReport>>, CoreError> {
        self.ensure_ready()?;
        let walker = SourceWalker::new(self.scan_config.clone());
        let (files, _) = walker.walk()?;

        let reports: Vec<_> = files
            .par_iter()
            .filter(|f| f.root_kind == SourceRootKind::Source)
            .filter_map(|file| match self.analyze_file(&file.path) {
                Ok(report) => report,
                Err(err) => {
                    log::warn!("analysis failed for {}: {}", file.path.display(), err);
                    None
                }
            })
            .collect();
        Ok(reports)
    }
}
