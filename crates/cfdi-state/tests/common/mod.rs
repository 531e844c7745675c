//! Ledger fixtures for lifecycle integration tests.

use std::time::Duration;

use chrono::NaiveDate;
use cfdi_core::{Amount, CompanyId, ConceptId, CounterpartyId, Quantity, Rfc};
use cfdi_invoice::{
    ConceptLine, CounterpartyProfile, FiscalTransaction, IssuerKeyMaterial, IssuerProfile, PaymentForm,
    PaymentMethod, TaxInput, TaxObject, TaxRates, TransactionKind,
};
use cfdi_state::{InMemoryRepository, LifecycleConfig};

pub fn fast_config() -> LifecycleConfig {
    LifecycleConfig {
        base_delay: Duration::from_millis(5),
        call_timeout: Duration::from_secs(2),
        ..LifecycleConfig::default()
    }
}

/// A repository holding one stampable income transaction for 10,000.00
/// plus IVA, and every record it references.
pub fn seeded() -> (InMemoryRepository, FiscalTransaction) {
    let repo = InMemoryRepository::new();
    let company_id = CompanyId::new();
    let counterparty_id = CounterpartyId::new();
    let concept_id = ConceptId::new();

    repo.insert_issuer(
        company_id,
        IssuerProfile {
            rfc: Rfc::new("EKU9003173C9").unwrap(),
            legal_name: "ESCUELA KEMPER URGATE".into(),
            tax_regime: "601".into(),
            postal_code: "42501".into(),
            currency: "MXN".into(),
        },
    );
    repo.insert_counterparty(CounterpartyProfile {
        id: counterparty_id,
        rfc: "XIQB891116QE4".into(),
        legal_name: "XOCHILT CASAS CHAVEZ".into(),
        tax_regime: "612".into(),
        cfdi_use: "G03".into(),
        postal_code: "10740".into(),
    });
    repo.insert_concept(ConceptLine {
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
    });
    repo.insert_key_material(company_id, IssuerKeyMaterial::new("30001000000500003416"));

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
    repo.insert_transaction(tx.clone());

    (repo, tx)
}
