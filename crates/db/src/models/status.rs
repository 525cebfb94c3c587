//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// All variants in seed order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Seed-data name of the status.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            /// Look up a status by database ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                Self::ALL.iter().copied().find(|s| s.id() == id)
            }

            /// Look up a status by seed-data name.
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|s| s.name() == name)
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Generation job status.
    JobStatus {
        /// Row created, not yet accepted by RunPod.
        Pending = 1 => "pending",
        /// Accepted by RunPod (`IN_QUEUE`).
        Queued = 2 => "queued",
        /// Running on a worker (`IN_PROGRESS`).
        Processing = 3 => "processing",
        Completed = 4 => "completed",
        Failed = 5 => "failed",
        Cancelled = 6 => "cancelled",
    }
}

impl JobStatus {
    /// Statuses from which a job never moves again.
    pub const TERMINAL: [JobStatus; 3] = [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled];

    /// Statuses the background poller watches.
    pub const ACTIVE: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Processing];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Queued.id(), 2);
        assert_eq!(JobStatus::Processing.id(), 3);
        assert_eq!(JobStatus::Completed.id(), 4);
        assert_eq!(JobStatus::Failed.id(), 5);
        assert_eq!(JobStatus::Cancelled.id(), 6);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = JobStatus::Failed.into();
        assert_eq!(id, 5);
    }

    #[test]
    fn lookup_by_id_and_name() {
        assert_eq!(JobStatus::from_id(3), Some(JobStatus::Processing));
        assert_eq!(JobStatus::from_id(42), None);
        assert_eq!(JobStatus::from_name("cancelled"), Some(JobStatus::Cancelled));
        assert_eq!(JobStatus::from_name("CANCELLED"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
