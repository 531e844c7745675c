//! # Document Builder
//!
//! Maps a validated transaction, the issuer and counterparty profiles and
//! the concept lines into an unsealed [`Comprobante`]. Pure: no I/O, no
//! clock, no randomness. Building the same inputs twice yields equal
//! documents.
//!
//! Amounts are computed per concept with [`crate::TaxFieldCalculator`] and
//! summed for the header; the transaction's own stored amounts are not
//! copied, so multi-concept documents stay internally consistent.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use cfdi_core::{Amount, Rate};

use crate::catalog::{FactorType, TaxCode};
use crate::comprobante::{
    Comprobante, Concepto, ConceptoImpuestos, Emisor, Impuestos, Receptor, Retencion, TaxLine,
    CFDI_VERSION, NOT_AN_EXPORT,
};
use crate::concept::ConceptLine;
use crate::profile::{CounterpartyProfile, IssuerProfile};
use crate::tax::TaxBreakdown;
use crate::validation::ValidatedTransaction;

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentBuilder;

impl DocumentBuilder {
    pub fn build(
        tx: &ValidatedTransaction,
        issuer: &IssuerProfile,
        counterparty: &CounterpartyProfile,
        concepts: &[ConceptLine],
    ) -> Comprobante {
        let transaction = tx.transaction();

        let mut conceptos = Vec::with_capacity(concepts.len());
        let mut breakdowns = Vec::with_capacity(concepts.len());
        for line in concepts {
            let breakdown = line.breakdown();
            conceptos.push(concepto(line, &breakdown));
            breakdowns.push(breakdown);
        }
        let totals: TaxBreakdown = breakdowns.iter().sum();
        let impuestos = summarize(&conceptos);

        let moneda = transaction
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(issuer.currency.as_str())
            .to_string();
        let tipo_cambio = if moneda == issuer.currency {
            None
        } else {
            transaction.exchange_rate
        };

        Comprobante {
            version: CFDI_VERSION.to_string(),
            serie: transaction.series.clone(),
            folio: transaction.folio.clone(),
            fecha: whole_seconds(transaction.issued_at),
            forma_pago: tx.payment_form(),
            condiciones_de_pago: transaction.payment_conditions.clone(),
            sub_total: totals.subtotal,
            moneda,
            tipo_cambio,
            total: totals.total,
            tipo_de_comprobante: transaction.kind.voucher_type(),
            exportacion: NOT_AN_EXPORT.to_string(),
            metodo_pago: tx.payment_method(),
            lugar_expedicion: issuer.postal_code.clone(),
            sello: None,
            no_certificado: None,
            emisor: Emisor {
                rfc: issuer.rfc.to_string(),
                nombre: issuer.legal_name.clone(),
                regimen_fiscal: issuer.tax_regime.clone(),
            },
            receptor: Receptor {
                rfc: counterparty.rfc.clone(),
                nombre: counterparty.legal_name.clone(),
                domicilio_fiscal_receptor: counterparty.postal_code.clone(),
                regimen_fiscal_receptor: counterparty.tax_regime.clone(),
                uso_cfdi: counterparty.cfdi_use.clone(),
            },
            conceptos,
            impuestos,
        }
    }
}

fn whole_seconds(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

/// For tax-inclusive lines `ValorUnitario` is the per-unit net price while
/// `Importe` is the net of the whole line, so `Cantidad × ValorUnitario`
/// may differ from `Importe` by up to half a cent per unit plus a cent.
fn concepto(line: &ConceptLine, b: &TaxBreakdown) -> Concepto {
    let rates = line.effective_rates();
    let valor_unitario = if line.tax_input().iva_included {
        line.unit_price.remove_rate(rates.iva)
    } else {
        line.unit_price
    };

    let mut impuestos = ConceptoImpuestos::default();
    if line.tax_object.itemizes_taxes() {
        impuestos.traslados.push(tax_line(b.subtotal, TaxCode::Iva, rates.iva, b.tax));
        if !rates.isr_withholding.is_zero() {
            impuestos.retenciones.push(tax_line(
                b.subtotal,
                TaxCode::Isr,
                rates.isr_withholding,
                b.isr_withholding,
            ));
        }
        if !rates.iva_withholding.is_zero() {
            impuestos.retenciones.push(tax_line(
                b.subtotal,
                TaxCode::Iva,
                rates.iva_withholding,
                b.iva_withholding,
            ));
        }
    }

    Concepto {
        clave_prod_serv: line.product_code.trim().to_string(),
        no_identificacion: line.sku.clone(),
        cantidad: line.quantity,
        clave_unidad: line.unit_code.trim().to_string(),
        unidad: line.unit_name.clone(),
        descripcion: line.description.clone(),
        valor_unitario,
        importe: b.subtotal,
        objeto_imp: line.tax_object,
        impuestos: (!impuestos.is_empty()).then_some(impuestos),
    }
}

fn tax_line(base: Amount, impuesto: TaxCode, rate: Rate, importe: Amount) -> TaxLine {
    TaxLine {
        base,
        impuesto,
        tipo_factor: FactorType::Tasa,
        tasa_o_cuota: rate,
        importe,
    }
}

/// Document-level summary: transferred taxes grouped by (tax, rate),
/// withholdings grouped by tax.
fn summarize(conceptos: &[Concepto]) -> Option<Impuestos> {
    let mut traslados: BTreeMap<(TaxCode, Rate), (Amount, Amount)> = BTreeMap::new();
    let mut retenciones: BTreeMap<TaxCode, Amount> = BTreeMap::new();

    for imp in conceptos.iter().filter_map(|c| c.impuestos.as_ref()) {
        for t in &imp.traslados {
            let entry = traslados.entry((t.impuesto, t.tasa_o_cuota)).or_default();
            entry.0 += t.base;
            entry.1 += t.importe;
        }
        for r in &imp.retenciones {
            *retenciones.entry(r.impuesto).or_default() += r.importe;
        }
    }

    if traslados.is_empty() && retenciones.is_empty() {
        return None;
    }

    let traslados: Vec<TaxLine> = traslados
        .into_iter()
        .map(|((impuesto, rate), (base, importe))| tax_line(base, impuesto, rate, importe))
        .collect();
    let retenciones: Vec<Retencion> = retenciones
        .into_iter()
        .map(|(impuesto, importe)| Retencion { impuesto, importe })
        .collect();

    Some(Impuestos {
        total_impuestos_retenidos: (!retenciones.is_empty())
            .then(|| retenciones.iter().map(|r| r.importe).sum()),
        total_impuestos_trasladados: (!traslados.is_empty())
            .then(|| traslados.iter().map(|t| t.importe).sum()),
        retenciones,
        traslados,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PaymentForm, PaymentMethod, TaxObject, TransactionKind, VoucherType};
    use crate::concept::fixtures::consulting;
    use crate::profile::fixtures::{counterparty, issuer};
    use crate::tax::TaxRates;
    use crate::transaction::fixtures;
    use crate::validation::TransactionValidator;
    use cfdi_core::{ConceptId, Quantity};

    fn build_with(lines: &[ConceptLine]) -> Comprobante {
        let tx = fixtures::income();
        let cp = counterparty(tx.counterparty_id.unwrap());
        let validated = TransactionValidator::validate(tx).unwrap();
        DocumentBuilder::build(&validated, &issuer(), &cp, lines)
    }

    #[test]
    fn single_concept_document() {
        let doc = build_with(&[consulting(ConceptId::new(), 1_000_000)]);
        assert_eq!(doc.version, "4.0");
        assert_eq!(doc.sub_total.to_string(), "10000.00");
        assert_eq!(doc.total.to_string(), "11600.00");
        assert_eq!(doc.metodo_pago, PaymentMethod::Pue);
        assert_eq!(doc.forma_pago, PaymentForm::Transfer);
        assert_eq!(doc.tipo_de_comprobante, VoucherType::Ingreso);
        assert_eq!(doc.moneda, "MXN");
        assert_eq!(doc.tipo_cambio, None);
        assert_eq!(doc.lugar_expedicion, "42501");
        assert!(doc.sello.is_none());

        let imp = doc.impuestos.as_ref().unwrap();
        assert_eq!(imp.total_impuestos_trasladados, Some(Amount::from_cents(160_000)));
        assert_eq!(imp.total_impuestos_retenidos, None);
        assert_eq!(imp.traslados.len(), 1);
        assert_eq!(imp.traslados[0].base, Amount::from_cents(1_000_000));
    }

    #[test]
    fn profiles_copied_verbatim() {
        let doc = build_with(&[consulting(ConceptId::new(), 100)]);
        assert_eq!(doc.emisor.rfc, "EKU9003173C9");
        assert_eq!(doc.emisor.nombre, "ESCUELA KEMPER URGATE");
        assert_eq!(doc.emisor.regimen_fiscal, "601");
        assert_eq!(doc.receptor.rfc, "XIQB891116QE4");
        assert_eq!(doc.receptor.uso_cfdi, "G03");
        assert_eq!(doc.receptor.domicilio_fiscal_receptor, "10740");
    }

    #[test]
    fn document_totals_are_sum_of_lines() {
        let mut exempt = consulting(ConceptId::new(), 25_050);
        exempt.tax_object = TaxObject::NotSubject;
        let mut withheld = consulting(ConceptId::new(), 333_333);
        withheld.rates = TaxRates::STANDARD_IVA.with_isr_withholding(Rate::from_percent(10));
        withheld.quantity = Quantity::parse("3").unwrap();
        let lines = [consulting(ConceptId::new(), 123_456), exempt, withheld];

        let doc = build_with(&lines);
        let expected: TaxBreakdown = lines.iter().map(ConceptLine::breakdown).sum();
        assert_eq!(doc.sub_total, expected.subtotal);
        assert_eq!(doc.total, expected.total);
        assert_eq!(doc.breakdown(), expected);
        assert!(doc.conceptos[1].impuestos.is_none());

        let imp = doc.impuestos.unwrap();
        assert_eq!(imp.retenciones.len(), 1);
        assert_eq!(imp.retenciones[0].impuesto, TaxCode::Isr);
        assert_eq!(imp.total_impuestos_retenidos, Some(expected.isr_withholding));
        // Both taxed lines share one 16% IVA summary row.
        assert_eq!(imp.traslados.len(), 1);
    }

    #[test]
    fn deferred_payment_and_expense() {
        let mut tx = fixtures::income().with_payment(PaymentMethod::Ppd, PaymentForm::ToBeDefined);
        tx.kind = TransactionKind::Expense;
        let cp = counterparty(tx.counterparty_id.unwrap());
        let validated = TransactionValidator::validate(tx).unwrap();
        let doc = DocumentBuilder::build(&validated, &issuer(), &cp, &[consulting(ConceptId::new(), 100)]);
        assert_eq!(doc.metodo_pago, PaymentMethod::Ppd);
        assert_eq!(doc.forma_pago, PaymentForm::ToBeDefined);
        assert_eq!(doc.tipo_de_comprobante, VoucherType::Egreso);
    }

    #[test]
    fn foreign_currency_carries_exchange_rate() {
        let rate = Rate::parse("17.2345").unwrap();
        let tx = fixtures::income().with_currency("USD", Some(rate));
        let cp = counterparty(tx.counterparty_id.unwrap());
        let validated = TransactionValidator::validate(tx).unwrap();
        let doc = DocumentBuilder::build(&validated, &issuer(), &cp, &[consulting(ConceptId::new(), 100)]);
        assert_eq!(doc.moneda, "USD");
        assert_eq!(doc.tipo_cambio, Some(rate));
    }

    #[test]
    fn iva_included_line_reports_pre_tax_unit_value() {
        let mut line = consulting(ConceptId::new(), 1_160_000);
        line.iva_included = true;
        let doc = build_with(&[line]);
        assert_eq!(doc.conceptos[0].valor_unitario, Amount::from_cents(1_000_000));
        assert_eq!(doc.total, Amount::from_cents(1_160_000));
    }

    #[test]
    fn iva_included_importe_stays_within_unit_rounding() {
        for price in [10_000, 100_003, 1_160_000, 99_999, 1] {
            for units in 1..=50 {
                let mut line = consulting(ConceptId::new(), price);
                line.iva_included = true;
                line.quantity = Quantity::units(units);
                let c = concepto(&line, &line.breakdown());
                let reported = c.cantidad.times(c.valor_unitario);
                let drift = (reported - c.importe).cents().abs();
                assert!(
                    drift * 2 <= units + 2,
                    "{units} x {} drifted {drift} cents from {}",
                    c.valor_unitario,
                    c.importe
                );
            }
        }
    }

    #[test]
    fn build_is_deterministic() {
        let lines = [consulting(ConceptId::new(), 99_999)];
        let tx = fixtures::income();
        let cp = counterparty(tx.counterparty_id.unwrap());
        let validated = TransactionValidator::validate(tx).unwrap();
        let a = DocumentBuilder::build(&validated, &issuer(), &cp, &lines);
        let b = DocumentBuilder::build(&validated, &issuer(), &cp, &lines);
        assert_eq!(a, b);
    }
}
