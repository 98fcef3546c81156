use chrono::NaiveDateTime;
use fake::Dummy;

#[derive(PartialEq, Debug, Dummy, Clone)]
pub struct TestRow {
    pub id: i64,
    pub score: f64,
    pub note: String,
    pub payload: Vec<u8>,
    #[dummy(
        expr = "chrono::NaiveDate::from_ymd_opt(2016, 7, 8).unwrap().and_hms_opt(9, 10, 11).unwrap()"
    )]
    pub created_at: NaiveDateTime,
}

impl From<postgres::Row> for TestRow {
    fn from(row: postgres::Row) -> Self {
        return Self {
            id: row.get(0),
            score: row.get(1),
            note: row.get(2),
            payload: row.get(3),
            created_at: row.get(4),
        };
    }
}

impl From<&rusqlite::Row<'_>> for TestRow {
    fn from(row: &rusqlite::Row<'_>) -> Self {
        return Self {
            id: row.get_unwrap(0),
            score: row.get_unwrap(1),
            note: row.get_unwrap(2),
            payload: row.get_unwrap(3),
            created_at: row.get_unwrap(4),
        };
    }
}

impl From<mysql::Row> for TestRow {
    fn from(row: mysql::Row) -> Self {
        return Self {
            id: row.get(0).unwrap(),
            score: row.get(1).unwrap(),
            note: row.get(2).unwrap(),
            payload: row.get(3).unwrap(),
            created_at: row.get(4).unwrap(),
        };
    }
}
