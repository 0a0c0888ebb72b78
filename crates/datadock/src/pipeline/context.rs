use crate::ai::InferredSchema;
use crate::matcher::RouteDecision;
use crate::reader::TableData;
use crate::vector::CandidateMatch;
use crate::worker::job::WorkItem;

pub struct PipelineContext {
    // Input
    pub item: WorkItem,

    // Step 1 result — guaranteed Some after step_read_table
    pub table: Option<TableData>,

    // Step 2 result — guaranteed Some after step_infer_schema
    pub schema: Option<InferredSchema>,

    // Original header spellings aligned with the schema columns; synthesized
    // names fill the gaps when the file has no usable header cell
    pub incoming_headers: Vec<String>,

    // Index of the first data row (1 when a header row was detected)
    pub data_start: usize,

    // Step 3 result
    pub candidates: Vec<CandidateMatch>,

    // Step 4 result — guaranteed Some after step_route
    pub route: Option<RouteDecision>,
}

impl PipelineContext {
    pub fn new(item: WorkItem) -> Self {
        Self {
            item,
            table: None,
            schema: None,
            incoming_headers: Vec::new(),
            data_start: 0,
            candidates: Vec::new(),
            route: None,
        }
    }

    /// Data rows of the read table, header excluded.
    pub fn data_rows(&self) -> &[Vec<String>] {
        match &self.table {
            Some(table) if self.data_start < table.records.len() => {
                &table.records[self.data_start..]
            }
            _ => &[],
        }
    }
}
