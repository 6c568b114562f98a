use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a registered user (client, veterinarian or admin).
    UserId
);
uuid_id!(PetId);
uuid_id!(AppointmentId);
uuid_id!(
    /// Identifier of a medical record.
    RecordId
);

/// Enums stored as lowercase text columns and sent as lowercase JSON strings.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Role fixed at account creation.
    Role {
        Client => "client",
        Veterinarian => "veterinarian",
        Admin => "admin",
    }
);

impl Role {
    /// Veterinarians and admins: the clinic side of the counter.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Veterinarian | Role::Admin)
    }
}

text_enum!(Species {
    Dog => "dog",
    Cat => "cat",
    Bird => "bird",
    Rabbit => "rabbit",
    Other => "other",
});

text_enum!(Gender {
    Male => "male",
    Female => "female",
    Unknown => "unknown",
});

impl Default for Gender {
    fn default() -> Self {
        Gender::Unknown
    }
}

text_enum!(ServiceType {
    Consultation => "consultation",
    Vaccination => "vaccination",
    Surgery => "surgery",
    Checkup => "checkup",
    Emergency => "emergency",
    Grooming => "grooming",
});

text_enum!(
    /// Appointment lifecycle. `Cancelled` and `Completed` are terminal.
    AppointmentStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

text_enum!(RecordType {
    Consultation => "consultation",
    Vaccination => "vaccination",
    Surgery => "surgery",
    Diagnosis => "diagnosis",
    Treatment => "treatment",
    Prescription => "prescription",
});
