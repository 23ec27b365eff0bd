use serde::{Deserialize, Serialize};

pub type PartyId = i64;

/// A customer or supplier the business trades with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: PartyId,
    #[serde(alias = "partyName")]
    pub name: String,
}
