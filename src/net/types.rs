//! Wire DTOs for the Velo REST API.
//!
//! DESIGN
//! ======
//! Rust field names are English; serde renames keep the backend's Portuguese
//! JSON keys (`nome`, `tipoUsuario`, `distanciaKm`, ...). The backend is lax
//! about `null` for strings and lists, so response fields go through
//! [`nullable`] and fall back to their defaults instead of failing the decode.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// ROLE
// =============================================================================

/// Account role. `Unset` is the empty string on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Role {
    /// `MOTORISTA`
    Driver,
    /// `PASSAGEIRO`
    Passenger,
    #[default]
    Unset,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "MOTORISTA",
            Self::Passenger => "PASSAGEIRO",
            Self::Unset => "",
        }
    }

    /// Lenient wire parse: anything that is not a known role is `Unset`.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MOTORISTA" => Self::Driver,
            "PASSAGEIRO" => Self::Passenger,
            _ => Self::Unset,
        }
    }

    #[must_use]
    pub fn is_unset(self) -> bool {
        self == Self::Unset
    }

    /// First role that is actually set, if any.
    #[must_use]
    pub fn or(self, fallback: Role) -> Role {
        if self.is_unset() { fallback } else { self }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motorista" | "driver" => Ok(Self::Driver),
            "passageiro" | "passenger" => Ok(Self::Passenger),
            other => Err(format!("unknown role '{other}' (expected 'motorista' or 'passageiro')")),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Unset, Self::from_wire))
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn role_is_unset(role: &Role) -> bool {
    role.is_unset()
}

// =============================================================================
// VEHICLES AND RIDES
// =============================================================================

/// A driver's vehicle profile (`categoria` on the wire).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vehicle {
    pub id: i64,
    #[serde(rename = "fabricante", deserialize_with = "nullable")]
    pub manufacturer: String,
    #[serde(rename = "modelo", deserialize_with = "nullable")]
    pub model: String,
    #[serde(rename = "ano", deserialize_with = "deserialize_i32_from_number")]
    pub year: i32,
    #[serde(rename = "cor", deserialize_with = "nullable")]
    pub color: String,
    #[serde(rename = "placa", deserialize_with = "nullable")]
    pub plate: String,
}

impl Vehicle {
    /// One-line summary, e.g. `Toyota Corolla - 2020 - Prata - ABC1D23`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} {} - {} - {} - {}",
            self.manufacturer, self.model, self.year, self.color, self.plate
        )
    }
}

/// Reference to the user owning a ride.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerRef {
    pub id: i64,
    #[serde(rename = "nome", deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// An offered ride (`produto` on the wire).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ride {
    pub id: i64,
    #[serde(rename = "titulo", deserialize_with = "nullable")]
    pub title: String,
    #[serde(rename = "descricao", deserialize_with = "nullable")]
    pub description: String,
    #[serde(rename = "preco", deserialize_with = "nullable")]
    pub price: f64,
    #[serde(rename = "origem", deserialize_with = "nullable")]
    pub origin: String,
    #[serde(rename = "destino", deserialize_with = "nullable")]
    pub destination: String,
    #[serde(rename = "distanciaKm", deserialize_with = "nullable")]
    pub distance_km: f64,
    #[serde(rename = "tempoMinutos", deserialize_with = "deserialize_u32_from_number")]
    pub duration_minutes: u32,
    #[serde(rename = "velocidadeMediaKmh", deserialize_with = "nullable")]
    pub average_speed_kmh: f64,
    #[serde(rename = "ativo", deserialize_with = "nullable")]
    pub active: bool,
    #[serde(rename = "data", deserialize_with = "nullable")]
    pub date: String,
    #[serde(rename = "motoristaMesmoGenero", deserialize_with = "nullable")]
    pub same_gender_driver: bool,
    #[serde(rename = "categoria", skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
    #[serde(rename = "usuario", skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerRef>,
}

impl Default for Ride {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            description: String::new(),
            price: 0.0,
            origin: String::new(),
            destination: String::new(),
            distance_km: 0.0,
            duration_minutes: 0,
            average_speed_kmh: 0.0,
            active: true,
            date: String::new(),
            same_gender_driver: false,
            vehicle: None,
            owner: None,
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

/// Login form payload for `POST /usuarios/logar`.
#[derive(Clone, Default, Serialize)]
pub struct Credentials {
    #[serde(rename = "usuario")]
    pub login: String,
    #[serde(rename = "senha")]
    pub password: String,
    /// Role picked on the login form, used when the server omits one.
    #[serde(rename = "tipoUsuario", skip_serializing_if = "role_is_unset")]
    pub role: Role,
}

impl Credentials {
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self { login: login.into(), password: password.into(), role: Role::Unset }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Response body of `POST /usuarios/logar`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    pub id: i64,
    #[serde(rename = "nome", deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "usuario", deserialize_with = "nullable")]
    pub login: String,
    #[serde(rename = "tipoUsuario")]
    pub role: Role,
    #[serde(rename = "foto", deserialize_with = "nullable")]
    pub photo: String,
    #[serde(deserialize_with = "nullable")]
    pub token: String,
    #[serde(rename = "sexo")]
    pub sex: Option<String>,
    #[serde(rename = "data")]
    pub date: Option<String>,
    #[serde(rename = "produto", deserialize_with = "nullable")]
    pub rides: Vec<Ride>,
}

/// Full user profile (`Usuario`), used for registration, profile fetch and
/// profile update.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: i64,
    #[serde(rename = "nome", deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "usuario", deserialize_with = "nullable")]
    pub login: String,
    /// Only sent when non-empty; the server never echoes it back meaningfully.
    #[serde(rename = "senha", deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(rename = "foto", deserialize_with = "nullable")]
    pub photo: String,
    #[serde(rename = "sexo", skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "tipoUsuario")]
    pub role: Role,
    #[serde(rename = "produto", deserialize_with = "nullable")]
    pub rides: Vec<Ride>,
}

impl fmt::Debug for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("login", &self.login)
            .field("photo", &self.photo)
            .field("sex", &self.sex)
            .field("date", &self.date)
            .field("role", &self.role)
            .field("rides", &self.rides.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DRIVER DASHBOARD
// =============================================================================

/// Daily summary from `GET /motoristas/{id}/dashboard`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverDashboard {
    #[serde(rename = "ganhosHoje", deserialize_with = "nullable")]
    pub earnings_today: f64,
    #[serde(rename = "viagensHoje", deserialize_with = "deserialize_u32_from_number")]
    pub trips_today: u32,
    #[serde(rename = "avaliacao", deserialize_with = "nullable")]
    pub rating: f64,
    #[serde(rename = "veiculo", deserialize_with = "nullable")]
    pub vehicle: String,
    #[serde(deserialize_with = "nullable")]
    pub online: bool,
}

/// Upcoming trip from `GET /motoristas/{id}/proxima-viagem`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextTrip {
    pub id: i64,
    #[serde(rename = "passageiro", deserialize_with = "nullable")]
    pub passenger: String,
    #[serde(rename = "rota", deserialize_with = "nullable")]
    pub route: String,
    #[serde(rename = "horario", deserialize_with = "nullable")]
    pub time: String,
}

// =============================================================================
// DESERIALIZE HELPERS
// =============================================================================

/// Treat JSON `null` as the type's default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_i64_from_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None => Ok(0),
        Some(serde_json::Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                return Ok(v);
            }
            if let Some(v) = n.as_f64() {
                if v.is_finite() {
                    #[allow(clippy::cast_possible_truncation)]
                    return Ok(v.round() as i64);
                }
            }
            Err(D::Error::custom("expected integer-compatible number"))
        }
        Some(_) => Err(D::Error::custom("expected number")),
    }
}

fn deserialize_i32_from_number<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_i64_from_number(deserializer)?;
    i32::try_from(value).map_err(|_| D::Error::custom(format!("value {value} out of range for i32")))
}

fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_i64_from_number(deserializer)?;
    u32::try_from(value).map_err(|_| D::Error::custom(format!("value {value} out of range for u32")))
}
