//! # Comprobante: CFDI 4.0 Document Model
//!
//! Field names follow the CFDI 4.0 attribute names (`SubTotal`,
//! `TipoDeComprobante`, `UsoCFDI`, ...) because this structure is also the
//! stamping authority's JSON contract. Renaming a field is a wire-format
//! change.
//!
//! Monetary values serialize as decimal strings through the fixed-point
//! types. Optional attributes are omitted rather than sent as `null`.

use chrono::NaiveDateTime;
use cfdi_core::{Amount, Quantity, Rate};
use serde::{Deserialize, Serialize};

use crate::catalog::{FactorType, PaymentForm, PaymentMethod, TaxCode, TaxObject, VoucherType};
use crate::seal::DigitalSeal;
use crate::tax::TaxBreakdown;

pub const CFDI_VERSION: &str = "4.0";

/// `c_Exportacion` "01": not an export.
pub const NOT_AN_EXPORT: &str = "01";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Comprobante {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio: Option<String>,
    pub fecha: NaiveDateTime,
    pub forma_pago: PaymentForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condiciones_de_pago: Option<String>,
    pub sub_total: Amount,
    pub moneda: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_cambio: Option<Rate>,
    pub total: Amount,
    pub tipo_de_comprobante: VoucherType,
    pub exportacion: String,
    pub metodo_pago: PaymentMethod,
    pub lugar_expedicion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sello: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_certificado: Option<String>,
    pub emisor: Emisor,
    pub receptor: Receptor,
    pub conceptos: Vec<Concepto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impuestos: Option<Impuestos>,
}

impl Comprobante {
    /// Attach the issuer's seal. An empty seal value means the authority
    /// seals on the issuer's behalf; only the certificate number is set.
    pub fn with_seal(mut self, seal: DigitalSeal) -> Self {
        self.sello = (!seal.value.is_empty()).then_some(seal.value);
        self.no_certificado = Some(seal.certificate_number);
        self
    }

    /// A copy with seal attributes cleared; this is what gets sealed.
    pub fn unsealed(&self) -> Self {
        Self {
            sello: None,
            no_certificado: None,
            ..self.clone()
        }
    }

    /// Document-level breakdown reconstructed from the header and tax
    /// summary.
    pub fn breakdown(&self) -> TaxBreakdown {
        let (tax, isr, iva_w) = match &self.impuestos {
            Some(imp) => {
                let withheld = |code: TaxCode| {
                    imp.retenciones
                        .iter()
                        .filter(|r| r.impuesto == code)
                        .map(|r| r.importe)
                        .sum::<Amount>()
                };
                (
                    imp.total_impuestos_trasladados.unwrap_or(Amount::ZERO),
                    withheld(TaxCode::Isr),
                    withheld(TaxCode::Iva),
                )
            }
            None => (Amount::ZERO, Amount::ZERO, Amount::ZERO),
        };
        TaxBreakdown {
            subtotal: self.sub_total,
            tax,
            isr_withholding: isr,
            iva_withholding: iva_w,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Emisor {
    pub rfc: String,
    pub nombre: String,
    pub regimen_fiscal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Receptor {
    pub rfc: String,
    pub nombre: String,
    pub domicilio_fiscal_receptor: String,
    pub regimen_fiscal_receptor: String,
    #[serde(rename = "UsoCFDI")]
    pub uso_cfdi: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Concepto {
    pub clave_prod_serv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_identificacion: Option<String>,
    pub cantidad: Quantity,
    pub clave_unidad: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unidad: Option<String>,
    pub descripcion: String,
    pub valor_unitario: Amount,
    pub importe: Amount,
    pub objeto_imp: TaxObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impuestos: Option<ConceptoImpuestos>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConceptoImpuestos {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traslados: Vec<TaxLine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retenciones: Vec<TaxLine>,
}

impl ConceptoImpuestos {
    pub fn is_empty(&self) -> bool {
        self.traslados.is_empty() && self.retenciones.is_empty()
    }
}

/// A transferred or withheld tax at concept level, or a transferred tax
/// in the document summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaxLine {
    pub base: Amount,
    pub impuesto: TaxCode,
    pub tipo_factor: FactorType,
    pub tasa_o_cuota: Rate,
    pub importe: Amount,
}

/// A withheld tax in the document summary, totalled per tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Retencion {
    pub impuesto: TaxCode,
    pub importe: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Impuestos {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_impuestos_retenidos: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_impuestos_trasladados: Option<Amount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retenciones: Vec<Retencion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traslados: Vec<TaxLine>,
}
