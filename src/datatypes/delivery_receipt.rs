// ABOUTME: Parses and renders the text body of SMSC delivery receipts
// ABOUTME: id:<ref> sub:001 dlvrd:001 submit date:<ts> done date:<ts> stat:<CODE> err:0 text:

use crate::datatypes::MessageStatus;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

const RECEIPT_DATE_FORMAT: &str = "%y%m%d%H%M";

fn receipt_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)id:\s*([a-zA-Z\-0-9]+)").ok())
        .as_ref()
}

/// The `stat:` word of a receipt.
///
/// SMSCs send both six and seven letter words (`DELIVR`/`DELIVRD`), so only
/// the first six letters are compared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiptStat {
    Delivered,
    Expired,
    UnknownRecipient,
    Accepted,
    Rejected,
    Undeliverable,
    /// A six letter word outside the table above
    Unrecognized(String),
    /// The receipt carried no usable `id:` or `stat:` token
    Unknown,
}

impl ReceiptStat {
    fn from_code(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "DELIVR" => ReceiptStat::Delivered,
            "EXPIRE" => ReceiptStat::Expired,
            "UNKNOW" => ReceiptStat::UnknownRecipient,
            "ACCEPT" => ReceiptStat::Accepted,
            "REJECT" => ReceiptStat::Rejected,
            "UNDELI" => ReceiptStat::Undeliverable,
            _ => ReceiptStat::Unrecognized(code.to_string()),
        }
    }

    /// Status to report for the receipted message, if the word is one the
    /// gateway acts on.
    pub fn message_status(&self) -> Option<MessageStatus> {
        match self {
            ReceiptStat::Delivered => Some(MessageStatus::DeliveredAckReceived),
            ReceiptStat::Expired => Some(MessageStatus::AckExpired),
            ReceiptStat::UnknownRecipient => Some(MessageStatus::UnknownRecipient),
            ReceiptStat::Accepted => Some(MessageStatus::ReceivedRouted),
            ReceiptStat::Rejected => Some(MessageStatus::Rejected),
            ReceiptStat::Undeliverable => Some(MessageStatus::MessageUndeliverable),
            ReceiptStat::Unrecognized(_) | ReceiptStat::Unknown => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Message id assigned by the SMSC when the original message was accepted
    pub id: String,
    pub stat: ReceiptStat,
}

impl DeliveryReceipt {
    /// Extract the `id:` and `stat:` tokens from a receipt body.
    ///
    /// Never fails: a body missing either token yields `ReceiptStat::Unknown`.
    pub fn parse(text: &str) -> Self {
        let id = receipt_id_pattern()
            .and_then(|pattern| pattern.captures(text))
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let stat = text
            .to_ascii_lowercase()
            .find("stat:")
            .map(|at| text[at + 5..].chars().take(6).collect::<String>())
            .filter(|code| code.chars().count() == 6);

        let stat = match stat {
            Some(code) if !id.is_empty() => ReceiptStat::from_code(&code),
            _ => ReceiptStat::Unknown,
        };

        DeliveryReceipt { id, stat }
    }

    /// Render a receipt body reporting `status` for message `id`.
    pub fn render(
        id: &str,
        status: MessageStatus,
        submitted: NaiveDateTime,
        done: NaiveDateTime,
    ) -> String {
        let stat = status.receipt_stat();
        let delivered = if stat == "DELIVRD" { "001" } else { "000" };

        format!(
            "id:{} sub:001 dlvrd:{} submit date:{} done date:{} stat:{} err:0 text:",
            id,
            delivered,
            submitted.format(RECEIPT_DATE_FORMAT),
            done.format(RECEIPT_DATE_FORMAT),
            stat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parse_typical_receipt() {
        let receipt = DeliveryReceipt::parse(
            "id:32C84E82 sub:001 dlvrd:001 submit date:0709111120 done date:0709111120 stat:DELIVRD err:0 text:",
        );
        assert_eq!(receipt.id, "32C84E82");
        assert_eq!(receipt.stat, ReceiptStat::Delivered);
        assert_eq!(
            receipt.stat.message_status(),
            Some(MessageStatus::DeliveredAckReceived)
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        let receipt = DeliveryReceipt::parse("ID: ab-12 Stat:expired");
        assert_eq!(receipt.id, "ab-12");
        assert_eq!(receipt.stat, ReceiptStat::Expired);

        let receipt = DeliveryReceipt::parse("id:1 stat:UNDELIV");
        assert_eq!(
            receipt.stat.message_status(),
            Some(MessageStatus::MessageUndeliverable)
        );
        assert_eq!(
            DeliveryReceipt::parse("id:1 stat:ACCEPTD").stat.message_status(),
            Some(MessageStatus::ReceivedRouted)
        );
    }

    #[test]
    fn missing_tokens_are_unknown() {
        assert_eq!(
            DeliveryReceipt::parse("id:123 sub:001").stat,
            ReceiptStat::Unknown
        );
        assert_eq!(
            DeliveryReceipt::parse("sub:001 stat:DELIVRD").stat,
            ReceiptStat::Unknown
        );
        assert_eq!(DeliveryReceipt::parse("id:1 stat:DEL").stat, ReceiptStat::Unknown);
        assert_eq!(DeliveryReceipt::parse("").stat.message_status(), None);
    }

    #[test]
    fn unrecognized_words_are_kept() {
        let receipt = DeliveryReceipt::parse("id:9 stat:ENROUTE");
        assert_eq!(receipt.stat, ReceiptStat::Unrecognized("ENROUT".to_string()));
        assert_eq!(receipt.stat.message_status(), None);
    }

    #[test]
    fn render_receipt() {
        let at = NaiveDate::from_ymd_opt(2007, 9, 11)
            .and_then(|d| d.and_hms_opt(11, 20, 0))
            .unwrap();

        assert_eq!(
            DeliveryReceipt::render("ab12", MessageStatus::Sent, at, at),
            "id:ab12 sub:001 dlvrd:001 submit date:0709111120 done date:0709111120 stat:DELIVRD err:0 text:"
        );
        assert_eq!(
            DeliveryReceipt::render("ab12", MessageStatus::Rejected, at, at),
            "id:ab12 sub:001 dlvrd:000 submit date:0709111120 done date:0709111120 stat:REJECTD err:0 text:"
        );

        let rendered = DeliveryReceipt::render("ab12", MessageStatus::UnknownRecipient, at, at);
        let receipt = DeliveryReceipt::parse(&rendered);
        assert_eq!(receipt.id, "ab12");
        assert_eq!(receipt.stat, ReceiptStat::UnknownRecipient);
    }
}
