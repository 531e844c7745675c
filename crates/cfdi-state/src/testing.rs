//! Shared unit-test fixtures.

use chrono::{NaiveDate, TimeZone, Utc};
use cfdi_core::{Amount, CompanyId, ConceptId, CounterpartyId, FolioFiscal, Quantity, Rfc};
use cfdi_invoice::{
    CounterpartyProfile, DocumentBuilder, FiscalTransaction, IssuerKeyMaterial, IssuerProfile, PaymentForm,
    PaymentMethod, StampReceipt, StampedDocument, TaxInput, TaxObject, TaxRates, TransactionKind,
    TransactionValidator,
};

use crate::repository::InMemoryRepository;

pub const CERTIFICATE_NUMBER: &str = "30001000000500003416";

pub fn issuer() -> IssuerProfile {
    IssuerProfile {
        rfc: Rfc::new("EKU9003173C9").unwrap(),
        legal_name: "ESCUELA KEMPER URGATE".into(),
        tax_regime: "601".into(),
        postal_code: "42501".into(),
        currency: "MXN".into(),
    }
}

pub fn counterparty(id: CounterpartyId) -> CounterpartyProfile {
    CounterpartyProfile {
        id,
        rfc: "XIQB891116QE4".into(),
        legal_name: "XOCHILT CASAS CHAVEZ".into(),
        tax_regime: "612".into(),
        cfdi_use: "G03".into(),
        postal_code: "10740".into(),
    }
}

pub fn consulting(concept_id: ConceptId) -> cfdi_invoice::ConceptLine {
    cfdi_invoice::ConceptLine {
        concept_id,
        product_code: "80101500".into(),
        unit_code: "E48".into(),
        unit_name: Some("Unidad de servicio".into()),
        sku: None,
        description: "Servicios de consultoría".into(),
        tax_object: TaxObject::Subject,
        quantity: Quantity::ONE,
        unit_price: Amount::from_cents(1_000_000),
        iva_included: false,
        rates: TaxRates::STANDARD_IVA,
    }
}

/// A Draft income transaction for 10,000.00 + IVA with every referenced
/// record present.
pub fn fixture_ledger() -> (InMemoryRepository, FiscalTransaction) {
    let repo = InMemoryRepository::new();
    let company_id = CompanyId::new();
    let counterparty_id = CounterpartyId::new();
    let concept_id = ConceptId::new();
    let issued_at = NaiveDate::from_ymd_opt(2026, 3, 14)
        .and_then(|d| d.and_hms_opt(10, 30, 0))
        .unwrap();

    let tx = FiscalTransaction::new(
        company_id,
        TransactionKind::Income,
        issued_at,
        TaxInput::new(Quantity::ONE, Amount::from_cents(1_000_000), TaxRates::STANDARD_IVA),
    )
    .with_counterparty(counterparty_id, "XIQB891116QE4")
    .with_concept(concept_id)
    .with_payment(PaymentMethod::Pue, PaymentForm::Transfer)
    .with_description("Consultoría fiscal marzo");

    repo.insert_issuer(company_id, issuer());
    repo.insert_counterparty(counterparty(counterparty_id));
    repo.insert_concept(consulting(concept_id));
    repo.insert_key_material(company_id, IssuerKeyMaterial::new(CERTIFICATE_NUMBER));
    repo.insert_transaction(tx.clone());
    (repo, tx)
}

/// A stamped document for `tx` as the authority would return it.
pub fn stamped_document(tx: &FiscalTransaction) -> StampedDocument {
    let validated = TransactionValidator::validate(tx.clone()).unwrap();
    let counterparty_id = tx.counterparty_id.unwrap();
    let comprobante = DocumentBuilder::build(
        &validated,
        &issuer(),
        &counterparty(counterparty_id),
        &[consulting(tx.concept_ids[0])],
    );
    let receipt = StampReceipt {
        uuid: FolioFiscal::parse("6c1b8f3a-0f3e-4b8a-9d7e-2a1c5b7e9f01").unwrap(),
        cfd_seal: String::new(),
        sat_seal: "U0FU".into(),
        sat_certificate_number: "00001000000505142236".into(),
        signed_xml: "<cfdi:Comprobante/>".into(),
        pdf_url: None,
        stamped_at: Utc.with_ymd_and_hms(2026, 3, 14, 16, 30, 5).unwrap(),
    };
    StampedDocument::new(tx.id, comprobante, receipt, "00".repeat(32))
}
