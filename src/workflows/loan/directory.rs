use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::domain::{ApplicantId, UserRecord};

/// Infrastructure failure while reading the backing store. "Not found" is not
/// an error; lookups return `Ok(None)` for unknown applicants.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read user directory file {path}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Read-only access to applicant records.
pub trait UserDirectory: Send + Sync {
    fn lookup(&self, user_id: &ApplicantId) -> Result<Option<UserRecord>, DirectoryError>;
}

#[derive(Debug, Deserialize)]
struct UserRow {
    user_id: String,
    name: String,
    monthly_income: f64,
    monthly_expenses: f64,
}

#[derive(Debug, Deserialize)]
struct LoanRow {
    user_id: String,
    existing_loan: f64,
}

/// Directory backed by two CSV exports: a users file and a loans file joined
/// on user id. An applicant without a loans row has no existing loan.
#[derive(Debug, Clone)]
pub struct CsvUserDirectory {
    users_path: PathBuf,
    loans_path: PathBuf,
}

impl CsvUserDirectory {
    pub fn new(users_path: impl Into<PathBuf>, loans_path: impl Into<PathBuf>) -> Self {
        Self {
            users_path: users_path.into(),
            loans_path: loans_path.into(),
        }
    }

    fn read_error(path: &Path, source: csv::Error) -> DirectoryError {
        DirectoryError::Read {
            path: path.display().to_string(),
            source,
        }
    }

    fn existing_loan_for(&self, user_id: &str) -> Result<f64, DirectoryError> {
        let mut reader = csv::Reader::from_path(&self.loans_path)
            .map_err(|source| Self::read_error(&self.loans_path, source))?;

        for row in reader.deserialize::<LoanRow>() {
            let row = row.map_err(|source| Self::read_error(&self.loans_path, source))?;
            if row.user_id == user_id {
                return Ok(row.existing_loan);
            }
        }

        Ok(0.0)
    }
}

impl UserDirectory for CsvUserDirectory {
    fn lookup(&self, user_id: &ApplicantId) -> Result<Option<UserRecord>, DirectoryError> {
        let mut reader = csv::Reader::from_path(&self.users_path)
            .map_err(|source| Self::read_error(&self.users_path, source))?;

        for row in reader.deserialize::<UserRow>() {
            let row = row.map_err(|source| Self::read_error(&self.users_path, source))?;
            if row.user_id != user_id.0 {
                continue;
            }

            let existing_loan = self.existing_loan_for(&row.user_id)?;
            return Ok(Some(UserRecord {
                user_id: ApplicantId(row.user_id),
                name: row.name,
                monthly_income: row.monthly_income,
                monthly_expenses: row.monthly_expenses,
                existing_loan,
            }));
        }

        Ok(None)
    }
}

/// Map-backed directory for tests and the CLI demo.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    records: HashMap<ApplicantId, UserRecord>,
}

impl InMemoryUserDirectory {
    /// Directory seeded with the bundled sample applicants.
    pub fn with_sample_records() -> Self {
        let mut directory = Self::default();
        for record in sample_records() {
            directory.insert(record);
        }
        directory
    }

    pub fn insert(&mut self, record: UserRecord) {
        self.records.insert(record.user_id.clone(), record);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn lookup(&self, user_id: &ApplicantId) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.records.get(user_id).cloned())
    }
}

/// The sample records shipped with the service for demos and tests.
pub fn sample_records() -> Vec<UserRecord> {
    vec![
        UserRecord {
            user_id: ApplicantId("USR001".to_string()),
            name: "John Doe".to_string(),
            monthly_income: 8000.0,
            monthly_expenses: 3000.0,
            existing_loan: 20_000.0,
        },
        UserRecord {
            user_id: ApplicantId("USR002".to_string()),
            name: "Jane Smith".to_string(),
            monthly_income: 12_000.0,
            monthly_expenses: 4000.0,
            existing_loan: 50_000.0,
        },
        UserRecord {
            user_id: ApplicantId("USR003".to_string()),
            name: "Bob Johnson".to_string(),
            monthly_income: 6000.0,
            monthly_expenses: 2500.0,
            existing_loan: 0.0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("loanagent-{}-{name}", std::process::id()));
        fs::write(&path, contents).expect("write fixture");
        path
    }

    #[test]
    fn in_memory_lookup_returns_sample_record() {
        let directory = InMemoryUserDirectory::with_sample_records();
        let record = directory
            .lookup(&ApplicantId("USR001".to_string()))
            .expect("lookup")
            .expect("record present");
        assert_eq!(record.name, "John Doe");
        assert_eq!(record.existing_loan, 20_000.0);

        let missing = directory
            .lookup(&ApplicantId("USR999".to_string()))
            .expect("lookup");
        assert!(missing.is_none());
    }

    #[test]
    fn csv_lookup_joins_loans_on_user_id() {
        let users = temp_file(
            "users.csv",
            "user_id,name,monthly_income,monthly_expenses\n\
             USR001,John Doe,8000,3000\n\
             USR003,Bob Johnson,6000,2500\n",
        );
        let loans = temp_file("loans.csv", "user_id,existing_loan\nUSR001,20000\n");

        let directory = CsvUserDirectory::new(&users, &loans);

        let with_loan = directory
            .lookup(&ApplicantId("USR001".to_string()))
            .expect("lookup")
            .expect("record present");
        assert_eq!(with_loan.existing_loan, 20_000.0);

        let without_loan = directory
            .lookup(&ApplicantId("USR003".to_string()))
            .expect("lookup")
            .expect("record present");
        assert_eq!(without_loan.existing_loan, 0.0);

        fs::remove_file(users).ok();
        fs::remove_file(loans).ok();
    }

    #[test]
    fn missing_users_file_is_an_infrastructure_error() {
        let directory = CsvUserDirectory::new("/nonexistent/users.csv", "/nonexistent/loans.csv");
        let result = directory.lookup(&ApplicantId("USR001".to_string()));
        assert!(matches!(result, Err(DirectoryError::Read { .. })));
    }
}
