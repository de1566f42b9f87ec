mod crm_client;
mod email_client;
mod maps_client;

pub use crm_client::{ContactUpdate, CrmClient};
pub use email_client::{Email, EmailClient, EmailError, MessageStream};
pub use maps_client::{MapsClient, MapsError};
