use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::path::Path;

pub fn open_db(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_info(
            roll_number TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            class_name TEXT,
            section TEXT,
            parent_contact TEXT NOT NULL,
            fee_status TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_marks(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            roll_number TEXT NOT NULL,
            subject TEXT NOT NULL,
            marks REAL,
            grade TEXT,
            type_of_exam TEXT,
            FOREIGN KEY(roll_number) REFERENCES student_info(roll_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_marks_roll ON student_marks(roll_number)",
        [],
    )?;

    Ok(conn)
}

/// `snake_case` column name to the camelCase key used on the wire.
pub fn camel_case(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut upper = false;
    for ch in column.chars() {
        if ch == '_' {
            upper = !out.is_empty();
            continue;
        }
        if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn cell_json(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

fn row_object(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Map<String, Value>> {
    let mut obj = Map::new();
    for (i, name) in columns.iter().enumerate() {
        obj.insert(camel_case(name), cell_json(row.get_ref(i)?));
    }
    Ok(obj)
}

fn query_objects(
    conn: &Connection,
    sql: &str,
    roll_number: &str,
) -> rusqlite::Result<Vec<Map<String, Value>>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    stmt.query_map([roll_number], |r| row_object(r, &columns))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
}

pub fn student_by_roll(
    conn: &Connection,
    roll_number: &str,
) -> rusqlite::Result<Option<Map<String, Value>>> {
    Ok(query_objects(
        conn,
        "SELECT * FROM student_info WHERE roll_number = ?",
        roll_number,
    )?
    .into_iter()
    .next())
}

pub fn marks_report(conn: &Connection, roll_number: &str) -> rusqlite::Result<Vec<Map<String, Value>>> {
    query_objects(
        conn,
        "SELECT si.roll_number, si.first_name, si.last_name,
                sm.subject, sm.marks, sm.grade, sm.type_of_exam
         FROM student_info si
         JOIN student_marks sm ON si.roll_number = sm.roll_number
         WHERE si.roll_number = ?
         ORDER BY sm.id",
        roll_number,
    )
}

pub fn fee_status(conn: &Connection, roll_number: &str) -> rusqlite::Result<Option<Value>> {
    conn.query_row(
        "SELECT fee_status FROM student_info WHERE roll_number = ?",
        [roll_number],
        |r| r.get_ref(0).map(cell_json),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_matches_wire_names() {
        assert_eq!(camel_case("roll_number"), "rollNumber");
        assert_eq!(camel_case("type_of_exam"), "typeOfExam");
        assert_eq!(camel_case("grade"), "grade");
        assert_eq!(camel_case("_hidden"), "hidden");
    }

    #[test]
    fn report_rows_follow_insert_order() {
        let conn = open_db(Path::new(":memory:")).expect("open db");
        conn.execute(
            "INSERT INTO student_info(roll_number, first_name, last_name, parent_contact, fee_status)
             VALUES('R1', 'Ana', 'Lee', '555', 'Paid')",
            [],
        )
        .expect("insert student");
        for (subject, marks) in [("Math", 91.5), ("Art", 77.0)] {
            conn.execute(
                "INSERT INTO student_marks(roll_number, subject, marks, grade, type_of_exam)
                 VALUES('R1', ?, ?, 'A', 'Midterm')",
                (subject, marks),
            )
            .expect("insert mark");
        }

        let rows = marks_report(&conn, "R1").expect("report");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["subject"], "Math");
        assert_eq!(rows[0]["marks"], 91.5);
        assert_eq!(rows[1]["typeOfExam"], "Midterm");
        assert_eq!(rows[1]["firstName"], "Ana");

        assert_eq!(fee_status(&conn, "R1").expect("fee"), Some(Value::from("Paid")));
        assert_eq!(fee_status(&conn, "R2").expect("fee"), None);
        let student = student_by_roll(&conn, "R1").expect("student").expect("row");
        assert_eq!(student["parentContact"], "555");
    }
}
