#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub deleted_count: i64,
}
