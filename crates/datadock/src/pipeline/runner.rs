use std::sync::Arc;

use tracing::{debug, info_span, warn};

use crate::ai::{InferredSchema, SchemaInference};
use crate::job::{DecisionPacket, IlPreview, JobStatus, OtlPreview};
use crate::matcher::{RouteDecision, SimilarityMatcher};
use crate::period::{
    detect, parse_period, parse_periods, DuplicateResult, DuplicateStatus, PeriodValue,
};
use crate::reader::{read_table, TableData};
use crate::schema::{validate, ColumnMapping};
use crate::store::{dataset_repo, table_repo, Database};
use crate::vector::{CandidateMatch, SchemaSignature, SimilarityIndex};
use crate::worker::job::AnalysisResult;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    inference: Box<dyn SchemaInference>,
    matcher: SimilarityMatcher,
    index: Arc<dyn SimilarityIndex>,
    db: Database,
}

impl Pipeline {
    /// Capabilities are injected by the service so tests can swap them.
    pub fn new(
        config: Arc<PipelineConfig>,
        inference: Box<dyn SchemaInference>,
        index: Arc<dyn SimilarityIndex>,
        db: Database,
    ) -> Self {
        let matcher = SimilarityMatcher::new(config.similarity_threshold);
        Self {
            config,
            inference,
            matcher,
            index,
            db,
        }
    }

    /// Analyzes a single file up to its decision packet.
    /// Returns an (AnalysisResult, PipelineContext) pair; no durable write
    /// happens here.
    pub fn run(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (AnalysisResult, PipelineContext) {
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.item.job_id,
            file = %ctx.item.file_name,
        )
        .entered();

        // Step 1: Read the table
        {
            let _step = info_span!("read_table").entered();
            progress.report(ProgressEvent::Status {
                status: JobStatus::Preprocessing,
                message: format!("Reading {}", ctx.item.file_name),
            });
            if let Err(e) = self.step_read_table(&mut ctx) {
                return self.fail(ctx, e);
            }
        }

        // Step 2: Infer the schema (same job status as step 1)
        {
            let _step = info_span!("infer_schema").entered();
            if let Err(e) = self.step_infer_schema(&mut ctx) {
                return self.fail(ctx, e);
            }
        }

        // Step 3: Search for similar datasets
        {
            let _step = info_span!("similarity_search").entered();
            progress.report(ProgressEvent::Status {
                status: JobStatus::SimilaritySearch,
                message: "Searching for similar datasets".to_string(),
            });
            if let Err(e) = self.step_search(&mut ctx) {
                return self.fail(ctx, e);
            }
        }

        // Step 4: Route
        {
            let _step = info_span!("route").entered();
            self.step_route(&mut ctx);
        }

        // Step 5: Build the decision packet
        let decided = {
            let _step = info_span!("build_decision").entered();
            self.step_build_decision(&ctx)
        };

        match decided {
            Ok((status, decision, message)) => {
                let schema = ctx.schema.clone().expect("schema set in step 2");
                let result = AnalysisResult::decided(
                    &ctx.item,
                    status,
                    schema,
                    ctx.candidates.clone(),
                    decision,
                    message,
                );
                (result, ctx)
            }
            Err(e) => self.fail(ctx, e),
        }
    }

    fn fail(
        &self,
        ctx: PipelineContext,
        error: PipelineError,
    ) -> (AnalysisResult, PipelineContext) {
        let error = error.to_string();
        warn!("analysis of {} failed: {}", ctx.item.file_name, error);
        let mut result = AnalysisResult::failure(&ctx.item, error);
        // partial artifacts still land on the job record
        result.schema = ctx.schema.clone();
        result.candidates = ctx.candidates.clone();
        (result, ctx)
    }

    fn step_read_table(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let table = read_table(&ctx.item.source_path)?;
        debug!(
            "read {} records from {}",
            table.record_count(),
            ctx.item.file_name
        );
        ctx.table = Some(table);
        Ok(())
    }

    fn step_infer_schema(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let table = ctx.table.as_ref().expect("step 1 completed");
        let schema = self.inference.infer(table)?;
        debug!(
            "inferred {} columns for {} via {} (confidence {:.2})",
            schema.columns.len(),
            ctx.item.file_name,
            self.inference.name(),
            schema.confidence
        );
        ctx.data_start = usize::from(schema.has_header_row);
        ctx.incoming_headers = incoming_headers(table, &schema);
        ctx.schema = Some(schema);
        Ok(())
    }

    fn step_search(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let schema = ctx.schema.as_ref().expect("step 2 completed");
        let signature = SchemaSignature::new(
            &schema.table_name,
            &schema.columns,
            schema.period_column.as_deref(),
        );
        let candidates = self.index.search(&signature, self.config.top_k)?;
        debug!(
            "{} candidate datasets for {}",
            candidates.len(),
            ctx.item.file_name
        );
        ctx.candidates = candidates;
        Ok(())
    }

    fn step_route(&self, ctx: &mut PipelineContext) {
        let route = self.matcher.route(&ctx.candidates);
        match &route {
            RouteDecision::Incremental { candidate } => debug!(
                "routing {} to incremental load against '{}' (score {:.3})",
                ctx.item.file_name, candidate.table_name, candidate.score
            ),
            RouteDecision::OneTime => {
                debug!("routing {} to one-time load", ctx.item.file_name)
            }
        }
        ctx.route = Some(route);
    }

    fn step_build_decision(
        &self,
        ctx: &PipelineContext,
    ) -> Result<(JobStatus, DecisionPacket, String), PipelineError> {
        match ctx.route.as_ref().expect("step 4 completed") {
            RouteDecision::OneTime => self.build_one_time(ctx),
            RouteDecision::Incremental { candidate } => self.build_incremental(ctx, candidate),
        }
    }

    fn build_one_time(
        &self,
        ctx: &PipelineContext,
    ) -> Result<(JobStatus, DecisionPacket, String), PipelineError> {
        let schema = ctx.schema.as_ref().expect("step 2 completed");
        let data_rows = ctx.data_rows();
        let proposed = self.unique_table_name(&schema.table_name)?;
        let preview = OtlPreview {
            proposed_table_name: proposed.clone(),
            columns: schema.columns.clone(),
            period_column: schema.period_column.clone(),
            sample_rows: data_rows
                .iter()
                .take(self.config.sample_rows)
                .cloned()
                .collect(),
            total_rows: data_rows.len() as u64,
        };
        let message = format!(
            "Ready for approval: create table '{}' from {} rows",
            proposed,
            data_rows.len()
        );
        Ok((
            JobStatus::AwaitingApproval,
            DecisionPacket::OneTimeLoad(preview),
            message,
        ))
    }

    fn build_incremental(
        &self,
        ctx: &PipelineContext,
        candidate: &CandidateMatch,
    ) -> Result<(JobStatus, DecisionPacket, String), PipelineError> {
        let dataset = dataset_repo::find_by_id(&self.db, &candidate.dataset_id)?
            .ok_or_else(|| PipelineError::TargetVanished(candidate.dataset_id.clone()))?;

        let target_columns = dataset.column_names();
        let validation = validate(&ctx.incoming_headers, &target_columns, &self.config.aliases);

        if !validation.is_compatible {
            let message = format!(
                "Schema mismatch against '{}': missing columns {}",
                dataset.table_name,
                validation.missing_columns.join(", ")
            );
            let preview = IlPreview::new(candidate.clone(), validation, None, dataset.row_count, 0);
            return Ok((
                JobStatus::SchemaMismatch,
                DecisionPacket::IncrementalLoad(preview),
                message,
            ));
        }

        let data_rows = ctx.data_rows();
        let period_idx = period_source_index(
            &ctx.incoming_headers,
            &validation.column_mapping,
            dataset.period_column.as_deref(),
        );
        let existing_last = dataset.last_period_value.as_deref().and_then(parse_period);

        let duplicate = period_idx.map(|idx| {
            let values: Vec<String> = data_rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or_default())
                .collect();
            detect(existing_last.as_ref(), &parse_periods(&values))
        });

        let rows_to_append = select_rows_to_append(
            data_rows,
            period_idx,
            existing_last.as_ref(),
            duplicate.as_ref(),
        )
        .len() as u64;

        let (status, message) = match &duplicate {
            Some(result) if result.status != DuplicateStatus::NewData => {
                (JobStatus::DuplicateDataDetected, result.message.clone())
            }
            _ => (
                JobStatus::AwaitingApproval,
                format!(
                    "Ready for approval: append {} rows to '{}'",
                    rows_to_append, dataset.table_name
                ),
            ),
        };
        let preview = IlPreview::new(
            candidate.clone(),
            validation,
            duplicate,
            dataset.row_count,
            rows_to_append,
        );
        Ok((status, DecisionPacket::IncrementalLoad(preview), message))
    }

    /// First free variant of `base`: the name itself, then `base_2`,
    /// `base_3`. Reserved or otherwise unusable names count as taken.
    fn unique_table_name(&self, base: &str) -> Result<String, PipelineError> {
        if !self.table_name_taken(base)? {
            return Ok(base.to_string());
        }
        let stem: String = base
            .chars()
            .take(table_repo::MAX_IDENTIFIER_LEN - 6)
            .collect();
        let mut suffix = 2;
        loop {
            let candidate = format!("{stem}_{suffix}");
            if !self.table_name_taken(&candidate)? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    fn table_name_taken(&self, name: &str) -> Result<bool, PipelineError> {
        if table_repo::validate_table_name(name).is_err() {
            return Ok(true);
        }
        if table_repo::table_exists(&self.db, name)? {
            return Ok(true);
        }
        Ok(dataset_repo::find_by_table_name(&self.db, name)?.is_some())
    }
}

/// Original header spellings, one per schema column. Missing or blank
/// header cells fall back to the synthesized canonical name so the list
/// always lines up with the schema.
pub fn incoming_headers(table: &TableData, schema: &InferredSchema) -> Vec<String> {
    schema
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            if schema.has_header_row {
                if let Some(cell) = table.records[0].get(idx).map(|c| c.trim()) {
                    if !cell.is_empty() {
                        return cell.to_string();
                    }
                }
            }
            column.name.clone()
        })
        .collect()
}

/// Index of the incoming data column feeding the target's period column,
/// resolved through the validation mapping.
pub fn period_source_index(
    headers: &[String],
    mapping: &[ColumnMapping],
    period_column: Option<&str>,
) -> Option<usize> {
    let period = period_column?;
    let source = mapping
        .iter()
        .find(|m| m.target == period)
        .map(|m| m.source.as_str())?;
    headers.iter().position(|h| h == source)
}

/// Data-row indices an approved incremental load appends. Loads classified
/// NEW_DATA (or never classified) take the whole file; otherwise only rows
/// whose period falls strictly after the recorded last period qualify.
pub fn select_rows_to_append(
    data_rows: &[Vec<String>],
    period_idx: Option<usize>,
    existing_last: Option<&PeriodValue>,
    duplicate: Option<&DuplicateResult>,
) -> Vec<usize> {
    let overlapping = duplicate.is_some_and(|d| d.status != DuplicateStatus::NewData);
    match (overlapping, period_idx, existing_last) {
        (true, Some(idx), Some(last)) => data_rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.get(idx)
                    .and_then(|value| parse_period(value))
                    .is_some_and(|period| period > *last)
            })
            .map(|(i, _)| i)
            .collect(),
        _ => (0..data_rows.len()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::HeuristicInference;
    use crate::pipeline::progress::NoopProgress;
    use crate::schema::{AliasTable, ColumnSchema, ColumnType};
    use crate::store::TargetDataset;
    use crate::vector::InMemoryIndex;
    use crate::worker::job::WorkItem;
    use chrono::Utc;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingProgress(Mutex<Vec<(JobStatus, String)>>);

    impl RecordingProgress {
        fn new() -> Self {
            Self(Mutex::new(Vec::new()))
        }

        fn statuses(&self) -> Vec<JobStatus> {
            self.0.lock().unwrap().iter().map(|(s, _)| *s).collect()
        }
    }

    impl ProgressReporter for RecordingProgress {
        fn report(&self, event: ProgressEvent) {
            let ProgressEvent::Status { status, message } = event;
            self.0.lock().unwrap().push((status, message));
        }
    }

    fn test_config() -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            similarity_threshold: 0.85,
            top_k: 5,
            sample_rows: 3,
            aliases: AliasTable::with_defaults(),
        })
    }

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn item_for(path: &Path) -> WorkItem {
        let job = crate::job::IngestJob::new(path);
        WorkItem::from_job(&job)
    }

    fn pipeline_with(db: &Database, index: Arc<InMemoryIndex>) -> Pipeline {
        Pipeline::new(
            test_config(),
            Box::new(HeuristicInference::new()),
            index,
            db.clone(),
        )
    }

    fn seed_dataset(
        db: &Database,
        index: &InMemoryIndex,
        table_name: &str,
        columns: &[(&str, ColumnType)],
        period_column: Option<&str>,
        last_period_value: Option<&str>,
        row_count: u64,
    ) -> String {
        let columns: Vec<ColumnSchema> = columns
            .iter()
            .map(|(name, ty)| ColumnSchema::new(*name, *ty))
            .collect();
        let now = Utc::now();
        let dataset = TargetDataset {
            id: uuid::Uuid::new_v4().to_string(),
            table_name: table_name.to_string(),
            columns: columns.clone(),
            period_column: period_column.map(String::from),
            last_period_value: last_period_value.map(String::from),
            row_count,
            created_at: now,
            updated_at: now,
        };
        dataset_repo::insert(db, &dataset).unwrap();
        index
            .upsert(
                &dataset.id,
                table_name,
                &SchemaSignature::new(table_name, &columns, period_column),
            )
            .unwrap();
        dataset.id
    }

    #[test]
    fn test_new_file_routes_to_one_time_load() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "regional sales.csv",
            "month,region,amount\n2024-01,north,10\n2024-02,south,11\n2024-03,east,12\n2024-04,west,13\n",
        );
        let db = Database::open_in_memory().unwrap();
        let pipeline = pipeline_with(&db, Arc::new(InMemoryIndex::new()));
        let progress = RecordingProgress::new();

        let (result, ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &progress);

        assert_eq!(result.status, JobStatus::AwaitingApproval);
        assert_eq!(
            progress.statuses(),
            vec![JobStatus::Preprocessing, JobStatus::SimilaritySearch]
        );
        let Some(DecisionPacket::OneTimeLoad(preview)) = result.decision else {
            panic!("expected a one-time load packet");
        };
        assert_eq!(preview.proposed_table_name, "regional_sales");
        assert_eq!(preview.total_rows, 4);
        assert_eq!(preview.sample_rows.len(), 3);
        assert_eq!(preview.period_column.as_deref(), Some("month"));
        assert_eq!(ctx.data_start, 1);
        assert_eq!(ctx.incoming_headers, ["month", "region", "amount"]);
    }

    #[test]
    fn test_matching_file_routes_to_incremental_load() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "sales.csv",
            "month,region,amount\n2024-01,north,10\n2024-02,south,11\n",
        );
        let db = Database::open_in_memory().unwrap();
        let index = Arc::new(InMemoryIndex::new());
        seed_dataset(
            &db,
            &index,
            "sales",
            &[
                ("month", ColumnType::Date),
                ("region", ColumnType::Text),
                ("amount", ColumnType::Integer),
            ],
            Some("month"),
            None,
            0,
        );
        let pipeline = pipeline_with(&db, index);

        let (result, _ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &NoopProgress);

        assert_eq!(result.status, JobStatus::AwaitingApproval);
        let Some(DecisionPacket::IncrementalLoad(preview)) = result.decision else {
            panic!("expected an incremental load packet");
        };
        assert_eq!(preview.target.table_name, "sales");
        assert!(preview.validation.is_compatible);
        assert_eq!(preview.rows_to_append, 2);
        assert_eq!(preview.total_rows_after, 2);
        let duplicate = preview.duplicate.expect("period column present");
        assert_eq!(duplicate.status, DuplicateStatus::NewData);
    }

    #[test]
    fn test_missing_target_column_is_schema_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "sales.csv",
            "month,region\n2024-01,north\n2024-02,south\n",
        );
        let db = Database::open_in_memory().unwrap();
        let index = Arc::new(InMemoryIndex::new());
        seed_dataset(
            &db,
            &index,
            "sales",
            &[
                ("month", ColumnType::Date),
                ("region", ColumnType::Text),
                ("amount", ColumnType::Integer),
            ],
            Some("month"),
            Some("2023-12"),
            24,
        );
        let pipeline = pipeline_with(&db, index);

        let (result, _ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &NoopProgress);

        assert_eq!(result.status, JobStatus::SchemaMismatch);
        let Some(DecisionPacket::IncrementalLoad(preview)) = result.decision else {
            panic!("expected an incremental load packet");
        };
        assert!(!preview.validation.is_compatible);
        assert_eq!(preview.validation.missing_columns, vec!["amount"]);
        assert!(preview.duplicate.is_none());
        assert_eq!(preview.rows_to_append, 0);
        assert!(result.message.unwrap().contains("amount"));
    }

    #[test]
    fn test_partial_overlap_flags_duplicate_data() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "sales.csv",
            "month,region,amount\n2024-01,north,10\n2024-02,south,11\n2024-03,east,12\n",
        );
        let db = Database::open_in_memory().unwrap();
        let index = Arc::new(InMemoryIndex::new());
        seed_dataset(
            &db,
            &index,
            "sales",
            &[
                ("month", ColumnType::Date),
                ("region", ColumnType::Text),
                ("amount", ColumnType::Integer),
            ],
            Some("month"),
            Some("2024-02"),
            14,
        );
        let pipeline = pipeline_with(&db, index);

        let (result, _ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &NoopProgress);

        assert_eq!(result.status, JobStatus::DuplicateDataDetected);
        let Some(DecisionPacket::IncrementalLoad(preview)) = result.decision else {
            panic!("expected an incremental load packet");
        };
        let duplicate = preview.duplicate.expect("detector ran");
        assert_eq!(duplicate.status, DuplicateStatus::PartialOverlap);
        assert_eq!(duplicate.overlapping_rows, 2);
        assert_eq!(duplicate.append_from.as_deref(), Some("2024-03"));
        assert_eq!(preview.rows_to_append, 1);
        assert_eq!(preview.total_rows_after, 15);
    }

    #[test]
    fn test_full_duplicate_appends_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "sales.csv",
            "month,region,amount\n2024-01,north,10\n2024-02,south,11\n",
        );
        let db = Database::open_in_memory().unwrap();
        let index = Arc::new(InMemoryIndex::new());
        seed_dataset(
            &db,
            &index,
            "sales",
            &[
                ("month", ColumnType::Date),
                ("region", ColumnType::Text),
                ("amount", ColumnType::Integer),
            ],
            Some("month"),
            Some("2024-06"),
            30,
        );
        let pipeline = pipeline_with(&db, index);

        let (result, _ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &NoopProgress);

        assert_eq!(result.status, JobStatus::DuplicateDataDetected);
        let Some(DecisionPacket::IncrementalLoad(preview)) = result.decision else {
            panic!("expected an incremental load packet");
        };
        assert_eq!(
            preview.duplicate.unwrap().status,
            DuplicateStatus::FullDuplicate
        );
        assert_eq!(preview.rows_to_append, 0);
        assert_eq!(preview.total_rows_after, 30);
    }

    #[test]
    fn test_target_without_period_column_skips_detection() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(
            tmp.path(),
            "lookup.csv",
            "code,label\n1,alpha\n2,beta\n",
        );
        let db = Database::open_in_memory().unwrap();
        let index = Arc::new(InMemoryIndex::new());
        seed_dataset(
            &db,
            &index,
            "lookup",
            &[("code", ColumnType::Integer), ("label", ColumnType::Text)],
            None,
            None,
            10,
        );
        let pipeline = pipeline_with(&db, index);

        let (result, _ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &NoopProgress);

        assert_eq!(result.status, JobStatus::AwaitingApproval);
        let Some(DecisionPacket::IncrementalLoad(preview)) = result.decision else {
            panic!("expected an incremental load packet");
        };
        assert!(preview.duplicate.is_none());
        assert_eq!(preview.rows_to_append, 2);
        assert_eq!(preview.total_rows_after, 12);
    }

    #[test]
    fn test_unreadable_file_fails_the_job() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = pipeline_with(&db, Arc::new(InMemoryIndex::new()));

        let (result, ctx) = pipeline.run(
            PipelineContext::new(item_for(Path::new("/nonexistent/sales.csv"))),
            &NoopProgress,
        );

        assert!(result.is_failure());
        assert!(result.error.is_some());
        assert!(result.decision.is_none());
        assert!(ctx.table.is_none());
    }

    #[test]
    fn test_proposed_name_collision_gets_suffix() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(tmp.path(), "sales.csv", "label,note\nx,alpha\ny,beta\n");
        let db = Database::open_in_memory().unwrap();
        let index = Arc::new(InMemoryIndex::new());
        // occupy the name without making the index similar enough to match
        seed_dataset(
            &db,
            &index,
            "sales",
            &[
                ("quarter", ColumnType::Text),
                ("revenue", ColumnType::Float),
                ("cost", ColumnType::Float),
                ("margin", ColumnType::Float),
            ],
            Some("quarter"),
            None,
            4,
        );
        let pipeline = pipeline_with(&db, index);

        let (result, _ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &NoopProgress);

        let Some(DecisionPacket::OneTimeLoad(preview)) = result.decision else {
            panic!("expected a one-time load packet, got {:?}", result.status);
        };
        assert_eq!(preview.proposed_table_name, "sales_2");
    }

    #[test]
    fn test_reserved_stem_is_never_proposed() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(tmp.path(), "jobs.csv", "label,note\nx,alpha\n");
        let db = Database::open_in_memory().unwrap();
        let pipeline = pipeline_with(&db, Arc::new(InMemoryIndex::new()));

        let (result, _ctx) = pipeline.run(PipelineContext::new(item_for(&path)), &NoopProgress);

        let Some(DecisionPacket::OneTimeLoad(preview)) = result.decision else {
            panic!("expected a one-time load packet");
        };
        assert_eq!(preview.proposed_table_name, "jobs_2");
    }

    #[test]
    fn test_select_rows_honors_duplicate_status() {
        let rows: Vec<Vec<String>> = [
            ["2024-01", "10"],
            ["2024-02", "11"],
            ["subtotal", "21"],
            ["2024-03", "12"],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
        let last = parse_period("2024-02").unwrap();
        let parsed = parse_periods(&["2024-01", "2024-02", "subtotal", "2024-03"]);
        let duplicate = detect(Some(&last), &parsed);
        assert_eq!(duplicate.status, DuplicateStatus::PartialOverlap);

        // overlap: only the strictly-new row qualifies, the unparsable one
        // stays out and is reported via unparsed_values instead
        let picked = select_rows_to_append(&rows, Some(0), Some(&last), Some(&duplicate));
        assert_eq!(picked, vec![3]);

        // new data: the whole file goes in
        let fresh = detect(None, &parsed);
        let picked = select_rows_to_append(&rows, Some(0), None, Some(&fresh));
        assert_eq!(picked, vec![0, 1, 2, 3]);

        // no period column: the whole file goes in
        let picked = select_rows_to_append(&rows, None, None, None);
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn test_period_source_index_resolves_aliases() {
        let headers = vec!["BaseYear".to_string(), "Amount".to_string()];
        let mapping = vec![
            ColumnMapping {
                source: "BaseYear".to_string(),
                target: "base_year".to_string(),
            },
            ColumnMapping {
                source: "Amount".to_string(),
                target: "amount".to_string(),
            },
        ];
        assert_eq!(
            period_source_index(&headers, &mapping, Some("base_year")),
            Some(0)
        );
        assert_eq!(period_source_index(&headers, &mapping, Some("month")), None);
        assert_eq!(period_source_index(&headers, &mapping, None), None);
    }

    #[test]
    fn test_incoming_headers_fall_back_to_schema_names() {
        let table = TableData {
            path: PathBuf::from("/in/d.csv"),
            file_name: "d.csv".to_string(),
            format: crate::config::TableFormat::Csv,
            records: vec![
                vec!["Month".to_string(), "".to_string()],
                vec!["2024-01".to_string(), "10".to_string()],
            ],
        };
        let schema = HeuristicInference::new().infer(&table).unwrap();
        assert!(schema.has_header_row);
        let headers = incoming_headers(&table, &schema);
        assert_eq!(headers, ["Month", "column_2"]);
    }
}
