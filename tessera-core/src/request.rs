use indexmap::IndexMap;

/// Number of rows to read from a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowCount {
    #[default]
    All,
    Rows(u64),
}

/// A dataset or attribute requested by the caller.
///
/// Plain strings convert into whole-column reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRequest {
    pub path: String,
    pub start_row: u64,
    pub num_rows: RowCount,
}

impl DatasetRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            start_row: 0,
            num_rows: RowCount::All,
        }
    }

    pub fn rows(path: impl Into<String>, start_row: u64, num_rows: RowCount) -> Self {
        Self {
            path: path.into(),
            start_row,
            num_rows,
        }
    }
}

impl From<&str> for DatasetRequest {
    fn from(path: &str) -> Self {
        DatasetRequest::new(path)
    }
}

impl From<String> for DatasetRequest {
    fn from(path: String) -> Self {
        DatasetRequest::new(path)
    }
}

impl From<&String> for DatasetRequest {
    fn from(path: &String) -> Self {
        DatasetRequest::new(path.as_str())
    }
}

/// Flags shared by every request of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Wait for every task before handing back the promise.
    pub block: bool,
    /// Stop parsing once the structural metadata is known.
    pub early_exit: bool,
    /// Skip value decoding entirely.
    pub meta_only: bool,
    /// Parse the attributes attached to each path as well.
    pub include_attributes: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            block: true,
            early_exit: false,
            meta_only: false,
            include_attributes: false,
        }
    }
}

impl ReadOptions {
    pub fn non_blocking(mut self) -> Self {
        self.block = false;
        self
    }

    pub fn with_early_exit(mut self) -> Self {
        self.early_exit = true;
        self
    }

    pub fn meta_only(mut self) -> Self {
        self.meta_only = true;
        self
    }

    pub fn with_attributes(mut self) -> Self {
        self.include_attributes = true;
        self
    }
}

/// Fully normalized request handed to the dataset parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRequestSpec {
    pub path: String,
    pub start_row: u64,
    pub num_rows: RowCount,
    pub early_exit: bool,
    pub meta_only: bool,
    pub include_attributes: bool,
}

impl DatasetRequestSpec {
    pub fn new(request: DatasetRequest, options: &ReadOptions) -> Self {
        Self {
            path: request.path,
            start_row: request.start_row,
            num_rows: request.num_rows,
            early_exit: options.early_exit,
            meta_only: options.meta_only,
            include_attributes: options.include_attributes,
        }
    }
}

/// Normalizes `requests` and keeps one spec per path.
///
/// A later request for the same path replaces the earlier one while the path
/// keeps its first-seen position.
pub fn dedup_requests<I, R>(requests: I, options: &ReadOptions) -> IndexMap<String, DatasetRequestSpec>
where
    I: IntoIterator<Item = R>,
    R: Into<DatasetRequest>,
{
    let mut specs = IndexMap::new();
    for request in requests {
        let spec = DatasetRequestSpec::new(request.into(), options);
        specs.insert(spec.path.clone(), spec);
    }
    specs
}
