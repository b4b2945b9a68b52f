mod mail;
mod templates;

pub use mail::{
    CalendarAttachment, IMailTransport, InMemoryMailTransport, LogMailTransport,
    MailTransportError, OutboundMessage, RelayMailTransport,
};
pub use templates::{DefaultTemplateResolver, ITemplateResolver};
